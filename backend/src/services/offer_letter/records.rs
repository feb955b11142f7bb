//! Reads the admitted applicant and writes offer-letter job state.
//!
//! Job state lives on the `applications` row. Every phase change after the
//! first is a compare-and-swap on `offer_letter_status`: the write only
//! lands when the row is still in the phase the caller last wrote, so a
//! stale writer cannot move a run backwards.

use crate::db::{now, StorageError};
use crate::media::{MediaStore, StoredFile};
use common::model::offer::{OfferLetterStatus, OfferPhase};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("applicant {applicant_id} not found")]
    ApplicantNotFound { applicant_id: i64 },
    #[error("applicant {applicant_id} has no admission record")]
    NoAdmission { applicant_id: i64 },
    #[error("applicant {applicant_id} expected phase {expected}, found {found}")]
    PhaseConflict {
        applicant_id: i64,
        expected: OfferPhase,
        found: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for RecordError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

/// Applicant joined with the admission and the records it points to.
#[derive(Debug, Clone)]
pub struct AdmittedApplicant {
    pub application_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub study_mode: String,
    pub student_id: Option<String>,
    pub reg_no: Option<String>,
    pub program_id: i64,
    pub program_name: String,
    pub program_code: String,
    pub min_years: i64,
    pub max_years: i64,
    pub tuition_fee: Option<String>,
    pub campus: Option<String>,
    pub batch: Option<String>,
    pub academic_year: Option<String>,
    pub admission_date: String,
}

pub fn load_admitted(conn: &Connection, applicant_id: i64) -> Result<AdmittedApplicant, RecordError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM applications WHERE id = ?1",
            params![applicant_id],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Err(RecordError::ApplicantNotFound { applicant_id });
    }

    conn.query_row(
        "SELECT a.id, a.first_name, a.last_name, a.email, a.study_mode,
                s.student_id, s.reg_no, p.id, p.name, p.code, p.min_years, p.max_years,
                p.tuition_fee, c.name, b.name, b.academic_year, s.admission_date
         FROM applications a
         JOIN admitted_students s ON s.application_id = a.id
         JOIN programs p ON p.id = s.admitted_program_id
         LEFT JOIN campuses c ON c.id = s.admitted_campus_id
         LEFT JOIN batches b ON b.id = s.admitted_batch_id
         WHERE a.id = ?1",
        params![applicant_id],
        |row| {
            Ok(AdmittedApplicant {
                application_id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                study_mode: row.get(4)?,
                student_id: row.get(5)?,
                reg_no: row.get(6)?,
                program_id: row.get(7)?,
                program_name: row.get(8)?,
                program_code: row.get(9)?,
                min_years: row.get(10)?,
                max_years: row.get(11)?,
                tuition_fee: row.get(12)?,
                campus: row.get(13)?,
                batch: row.get(14)?,
                academic_year: row.get(15)?,
                admission_date: row.get(16)?,
            })
        },
    )
    .optional()?
    .ok_or(RecordError::NoAdmission { applicant_id })
}

/// Starts a run: records the new DOCX, clears the previous PDF and puts the
/// job in `docx_generated`, whatever state the last run left behind.
pub fn begin_run(conn: &Connection, applicant_id: i64, docx: &StoredFile) -> Result<(), RecordError> {
    let phase = OfferPhase::DocxGenerated;
    let changed = conn.execute(
        "UPDATE applications
         SET admission_letter_docx = ?1, admission_letter_pdf = NULL,
             offer_letter_status = ?2, offer_letter_progress = ?3, updated_at = ?4
         WHERE id = ?5",
        params![docx.relative_path, phase.as_str(), phase.progress(), now(), applicant_id],
    )?;
    if changed == 0 {
        return Err(RecordError::ApplicantNotFound { applicant_id });
    }
    Ok(())
}

/// Moves the job from `from` to `to`.
pub fn advance(
    conn: &Connection,
    applicant_id: i64,
    from: OfferPhase,
    to: OfferPhase,
) -> Result<(), RecordError> {
    if !from.can_advance_to(to) {
        return Err(RecordError::PhaseConflict {
            applicant_id,
            expected: from,
            found: to.to_string(),
        });
    }
    let changed = conn.execute(
        "UPDATE applications
         SET offer_letter_status = ?1, offer_letter_progress = ?2, updated_at = ?3
         WHERE id = ?4 AND offer_letter_status = ?5",
        params![to.as_str(), to.progress(), now(), applicant_id, from.as_str()],
    )?;
    if changed == 0 {
        return Err(conflict(conn, applicant_id, from));
    }
    Ok(())
}

/// Records the PDF and marks the application admitted. Only allowed once the
/// job has reached `pdf_ready`.
pub fn record_pdf(conn: &Connection, applicant_id: i64, pdf: &StoredFile) -> Result<(), RecordError> {
    let changed = conn.execute(
        "UPDATE applications
         SET admission_letter_pdf = ?1, status = 'Admitted', updated_at = ?2
         WHERE id = ?3 AND offer_letter_status = ?4",
        params![pdf.relative_path, now(), applicant_id, OfferPhase::PdfReady.as_str()],
    )?;
    if changed == 0 {
        return Err(conflict(conn, applicant_id, OfferPhase::PdfReady));
    }
    Ok(())
}

/// Finishes a delivered run: `email_sent` plus the admission's sent flag.
pub fn mark_letter_sent(conn: &mut Connection, applicant_id: i64) -> Result<(), RecordError> {
    let tx = conn.transaction()?;
    advance(&tx, applicant_id, OfferPhase::PdfReady, OfferPhase::EmailSent)?;
    tx.execute(
        "UPDATE admitted_students
         SET admission_letter_sent = 1, admission_letter_sent_at = ?1
         WHERE application_id = ?2",
        params![now(), applicant_id],
    )?;
    tx.commit()?;
    Ok(())
}

/// Puts a run that has not reached a terminal phase into `failed`.
/// Returns false when there was nothing to fail.
pub fn fail(conn: &Connection, applicant_id: i64) -> Result<bool, RecordError> {
    let phase = OfferPhase::Failed;
    let changed = conn.execute(
        "UPDATE applications
         SET offer_letter_status = ?1, offer_letter_progress = ?2, updated_at = ?3
         WHERE id = ?4 AND offer_letter_status NOT IN (?5, ?1)",
        params![
            phase.as_str(),
            phase.progress(),
            now(),
            applicant_id,
            OfferPhase::EmailSent.as_str()
        ],
    )?;
    Ok(changed > 0)
}

pub fn read_status(
    conn: &Connection,
    media: &MediaStore,
    applicant_id: i64,
) -> Result<OfferLetterStatus, RecordError> {
    let row: Option<(String, i64, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT offer_letter_status, offer_letter_progress,
                    admission_letter_docx, admission_letter_pdf
             FROM applications WHERE id = ?1",
            params![applicant_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let (status, progress, docx, pdf) = row.ok_or(RecordError::ApplicantNotFound { applicant_id })?;

    let status = status.parse::<OfferPhase>().map_err(|_| StorageError::Corrupt {
        column: "applications.offer_letter_status",
        value: status.clone(),
    })?;

    Ok(OfferLetterStatus {
        status,
        progress: progress.clamp(0, 100) as u8,
        docx_url: docx.filter(|path| !path.is_empty()).map(|path| media.url_for(&path)),
        pdf_url: pdf.filter(|path| !path.is_empty()).map(|path| media.url_for(&path)),
    })
}

fn conflict(conn: &Connection, applicant_id: i64, expected: OfferPhase) -> RecordError {
    let found = conn
        .query_row(
            "SELECT offer_letter_status FROM applications WHERE id = ?1",
            params![applicant_id],
            |row| row.get::<_, String>(0),
        )
        .optional();
    match found {
        Ok(Some(found)) => RecordError::PhaseConflict {
            applicant_id,
            expected,
            found,
        },
        Ok(None) => RecordError::ApplicantNotFound { applicant_id },
        Err(err) => err.into(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::{params, Connection};

    /// Inserts a program, campus, batch and an admitted applicant.
    pub(crate) fn seed_admitted(conn: &Connection, applicant_id: i64, program_id: i64) {
        conn.execute(
            "INSERT OR IGNORE INTO programs (id, name, code, min_years, max_years, tuition_fee)
             VALUES (?1, 'Bachelor of Science in Nursing', 'BSN', 4, 6, 'UGX 1,850,000')",
            params![program_id],
        )
        .expect("program");
        conn.execute(
            "INSERT OR IGNORE INTO campuses (id, name, code) VALUES (1, 'Main Campus', 'MC')",
            [],
        )
        .expect("campus");
        conn.execute(
            "INSERT OR IGNORE INTO batches (id, name, academic_year) VALUES (1, 'August Intake', '2025/2026')",
            [],
        )
        .expect("batch");
        seed_applicant(conn, applicant_id);
        conn.execute(
            "INSERT INTO admitted_students
                (application_id, student_id, reg_no, admitted_program_id,
                 admitted_batch_id, admitted_campus_id, admission_date)
             VALUES (?1, ?2, NULL, ?3, 1, 1, '2025-08-04')",
            params![applicant_id, format!("2500{applicant_id}"), program_id],
        )
        .expect("admission");
    }

    /// Inserts an application with no admission.
    pub(crate) fn seed_applicant(conn: &Connection, applicant_id: i64) {
        conn.execute(
            "INSERT INTO applications (id, first_name, middle_name, last_name, email, study_mode, status)
             VALUES (?1, 'Amina', '', 'Nakato', ?2, 'Day', 'Pending')",
            params![applicant_id, format!("applicant{applicant_id}@example.org")],
        )
        .expect("application");
    }
}
