use super::pipeline::PipelineError;
use super::records::RecordError;
use super::render::TemplateRenderError;
use crate::db::StorageError;
use crate::job_controller::state::JobBusy;
use crate::services::templates::store::TemplateStoreError;
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde::Serialize;

/// `{"detail": ...}` body shared by error and acknowledgement responses.
#[derive(Debug, Serialize)]
pub struct Detail<'a> {
    pub detail: &'a str,
}

/// Errors returned by the offer-letter and template endpoints.
///
/// Every variant renders as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum OfferLetterError {
    #[error(transparent)]
    Records(#[from] RecordError),
    #[error(transparent)]
    Templates(#[from] TemplateStoreError),
    #[error(transparent)]
    Busy(#[from] JobBusy),
    #[error("failed to render offer letter: {0}")]
    Render(#[from] TemplateRenderError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    BadRequest(String),
    #[error("background worker failed: {0}")]
    Worker(#[from] BlockingError),
}

impl From<rusqlite::Error> for OfferLetterError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

impl ResponseError for OfferLetterError {
    fn status_code(&self) -> StatusCode {
        match self {
            OfferLetterError::Records(
                RecordError::ApplicantNotFound { .. } | RecordError::NoAdmission { .. },
            ) => StatusCode::NOT_FOUND,
            OfferLetterError::Records(RecordError::PhaseConflict { .. }) => StatusCode::CONFLICT,
            OfferLetterError::Templates(TemplateStoreError::NoTemplateAvailable { .. }) => {
                StatusCode::BAD_REQUEST
            }
            OfferLetterError::Templates(TemplateStoreError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            OfferLetterError::Busy(_) => StatusCode::CONFLICT,
            OfferLetterError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(Detail {
            detail: &self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn missing_template_is_a_bad_request_with_detail() {
        let err: OfferLetterError = TemplateStoreError::NoTemplateAvailable { program_id: 7 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = to_bytes(err.error_response().into_body()).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["detail"], "No template uploaded for program 7");
    }

    #[test]
    fn lookup_failures_map_to_not_found_and_busy_to_conflict() {
        let missing: OfferLetterError = RecordError::NoAdmission { applicant_id: 3 }.into();
        let busy: OfferLetterError = JobBusy { applicant_id: 3 }.into();
        let broken: OfferLetterError = TemplateRenderError::MissingDocumentPart.into();

        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(busy.status_code(), StatusCode::CONFLICT);
        assert_eq!(broken.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
