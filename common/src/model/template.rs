use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of an uploaded offer-letter template. Only `Active`
/// templates are eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    #[default]
    Active,
    Inactive,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Active => "active",
            TemplateStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TemplateStatus::Active),
            "inactive" => Ok(TemplateStatus::Inactive),
            other => Err(format!("unknown template status '{other}'")),
        }
    }
}

/// A DOCX blueprint bound to one or more programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTemplate {
    pub id: i64,
    pub name: String,
    /// Location of the stored file, relative to the media root.
    pub file_path: String,
    pub file_url: String,
    pub status: TemplateStatus,
    pub programs: Vec<i64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Response of a template upload. `unknown_placeholders` lists the keys
/// the document uses that no render context will ever supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateUploadResponse {
    pub template: OfferTemplate,
    pub placeholders: Vec<String>,
    pub unknown_placeholders: Vec<String>,
}
