use crate::model::template::TemplateStatus;
use serde::Deserialize;

/// Metadata part (`json`) of the multipart template upload.
#[derive(Debug, Deserialize)]
pub struct UploadTemplateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: TemplateStatus,
    pub programs: Vec<i64>,
}

/// Payload of `PUT /offer_letter/template_status/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateTemplateStatusRequest {
    pub status: TemplateStatus,
}

/// Metadata part (`json`) of `PUT /offer_letter/edit_template/{id}`.
///
/// Fields left out keep their current value. `programs`, when given,
/// replaces the template's program bindings.
#[derive(Debug, Default, Deserialize)]
pub struct EditTemplateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<TemplateStatus>,
    #[serde(default)]
    pub programs: Option<Vec<i64>>,
}
