use super::records::AdmittedApplicant;
use chrono::NaiveDate;
use common::model::render_context::{RenderContext, CONTEXT_KEYS};

/// Shown for identifiers the registry has not issued yet.
const NOT_ISSUED: &str = "TBD";

/// Builds the values for an applicant's offer letter.
///
/// Every key in [`CONTEXT_KEYS`] is present in the result.
pub fn build(applicant: &AdmittedApplicant) -> RenderContext {
    let mut context = RenderContext::new();
    for key in CONTEXT_KEYS {
        context.insert(key, "");
    }

    context.insert(
        "full_name",
        format!("{} {}", applicant.first_name.trim(), applicant.last_name.trim()),
    );
    context.insert("first_name", applicant.first_name.trim());
    context.insert("last_name", applicant.last_name.trim());
    context.insert("student_no", issued(applicant.student_id.as_deref()));
    context.insert("reg_no", issued(applicant.reg_no.as_deref()));
    context.insert("program_name", applicant.program_name.as_str());
    context.insert("program_code", applicant.program_code.as_str());
    context.insert("fees", applicant.tuition_fee.clone().unwrap_or_default());
    context.insert("duration", years(applicant.min_years));
    context.insert("max_duration", years(applicant.max_years));
    context.insert("campus", applicant.campus.clone().unwrap_or_default());
    context.insert("study_mode", applicant.study_mode.as_str());
    context.insert("batch", applicant.batch.clone().unwrap_or_default());
    context.insert(
        "academic_year",
        applicant.academic_year.clone().unwrap_or_default(),
    );
    context.insert("admission_date", long_date(&applicant.admission_date));
    context
}

fn issued(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => NOT_ISSUED.to_string(),
    }
}

fn years(count: i64) -> String {
    match count {
        n if n <= 0 => String::new(),
        1 => "1 year".to_string(),
        n => format!("{n} years"),
    }
}

/// `2025-08-04` becomes `4 August 2025`; anything else is used as stored.
fn long_date(value: &str) -> String {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => date.format("%-d %B %Y").to_string(),
        Err(_) => value.to_string(),
    }
}
