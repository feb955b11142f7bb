use super::store::{self, NewTemplate};
use super::TEMPLATE_DIR;
use crate::db::Database;
use crate::media::MediaStore;
use crate::services::offer_letter::error::OfferLetterError;
use crate::services::offer_letter::render;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::model::render_context::is_known_key;
use common::model::template::TemplateUploadResponse;
use common::requests::UploadTemplateRequest;
use futures_util::StreamExt;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::from_slice;

/// Largest template accepted, in bytes.
const MAX_TEMPLATE_BYTES: usize = 20 * 1024 * 1024;

pub(crate) async fn process(
    payload: Multipart,
    db: web::Data<Database>,
    media: web::Data<MediaStore>,
) -> Result<HttpResponse, OfferLetterError> {
    let uploaded = upload_template(payload, db.get_ref().clone(), media.get_ref().clone()).await?;
    Ok(HttpResponse::Created().json(uploaded))
}

/// Reads the multipart upload, checks the document and stores it.
///
/// The file is saved under `offer_templates/` named by its MD5 digest, so
/// uploading the same document twice reuses one file.
pub async fn upload_template(
    payload: Multipart,
    db: Database,
    media: MediaStore,
) -> Result<TemplateUploadResponse, OfferLetterError> {
    let form = read_form::<UploadTemplateRequest>(payload).await?;
    let request = form
        .metadata
        .ok_or_else(|| bad_request("Missing template metadata"))?;
    let document = form.file.ok_or_else(|| bad_request("Missing file"))?;
    if request.programs.is_empty() {
        return Err(bad_request("A template must be bound to at least one program"));
    }

    let scanned = document.scan()?;
    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| document.stem());
    let relative = document.stored_path();

    let template = web::block(move || -> Result<_, OfferLetterError> {
        let stored = media.save(&relative, &document.bytes)?;
        let mut conn = db.open()?;
        Ok(store::insert(
            &mut conn,
            NewTemplate {
                name,
                file_path: stored.relative_path,
                file_url: stored.url,
                status: request.status,
                programs: request.programs,
                uploaded_at: Utc::now(),
            },
        )?)
    })
    .await??;

    info!(
        "template {} ('{}') uploaded for programs {:?}",
        template.id, template.name, template.programs
    );
    Ok(TemplateUploadResponse {
        template,
        placeholders: scanned.placeholders,
        unknown_placeholders: scanned.unknown,
    })
}

/// The `json` and `file` parts of a template form.
pub(super) struct TemplateForm<T> {
    pub metadata: Option<T>,
    pub file: Option<TemplateDocument>,
}

pub(super) struct TemplateDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub(super) struct Placeholders {
    pub placeholders: Vec<String>,
    pub unknown: Vec<String>,
}

impl TemplateDocument {
    /// Lists the placeholders the document declares; a file that is not a
    /// usable DOCX is a bad request.
    pub fn scan(&self) -> Result<Placeholders, OfferLetterError> {
        let placeholders = render::placeholders(&self.bytes)
            .map_err(|e| bad_request(format!("Not a usable offer letter template: {e}")))?;
        let unknown: Vec<String> = placeholders
            .iter()
            .filter(|key| !is_known_key(key))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            warn!(
                "template '{}' uses placeholders with no value: {:?}",
                self.filename, unknown
            );
        }
        Ok(Placeholders {
            placeholders,
            unknown,
        })
    }

    pub fn stem(&self) -> String {
        self.filename.trim_end_matches(".docx").to_string()
    }

    /// Content-addressed location under the template directory.
    pub fn stored_path(&self) -> String {
        format!("{TEMPLATE_DIR}/{:x}.docx", md5::compute(&self.bytes))
    }
}

pub(super) async fn read_form<T: DeserializeOwned>(
    mut payload: Multipart,
) -> Result<TemplateForm<T>, OfferLetterError> {
    let mut form = TemplateForm {
        metadata: None,
        file: None,
    };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| bad_request(format!("malformed upload: {e}")))?;
        let part_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match part_name.as_deref() {
            Some("json") => {
                let bytes = read_field(&mut field).await?;
                let parsed: T = from_slice(&bytes)
                    .map_err(|e| bad_request(format!("invalid template metadata: {e}")))?;
                form.metadata = Some(parsed);
            }
            Some("file") => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                if !filename.to_ascii_lowercase().ends_with(".docx") {
                    return Err(bad_request("The file must end with .docx"));
                }
                let bytes = read_field(&mut field).await?;
                form.file = Some(TemplateDocument { filename, bytes });
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn read_field(field: &mut Field) -> Result<Vec<u8>, OfferLetterError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| bad_request(format!("malformed upload: {e}")))?;
        if bytes.len() + chunk.len() > MAX_TEMPLATE_BYTES {
            return Err(bad_request("The file is too large"));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(super) fn bad_request(detail: impl Into<String>) -> OfferLetterError {
    OfferLetterError::BadRequest(detail.into())
}
