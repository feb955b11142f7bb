//! `POST /api/offer_letter/send_letter/{applicant_id}`
//!
//! Renders the applicant's letter while the request waits, then hands the
//! conversion and delivery to the background and answers `202 Accepted`.
//! Progress is observed through the status endpoint.

use super::context;
use super::error::OfferLetterError;
use super::pipeline::{OfferJobHandle, OfferPipeline};
use super::records;
use super::render;
use crate::job_controller::state::JobsState;
use crate::services::templates::store;
use actix_web::{web, HttpResponse};
use common::model::offer::SendLetterResponse;
use log::info;

pub(crate) async fn process(
    applicant_id: web::Path<i64>,
    pipeline: web::Data<OfferPipeline>,
    jobs: web::Data<JobsState>,
) -> Result<HttpResponse, OfferLetterError> {
    let handle = send_letter(applicant_id.into_inner(), &pipeline, &jobs).await?;
    Ok(HttpResponse::Accepted().json(SendLetterResponse {
        detail: "Offer letter processing".to_string(),
        status: "processing".to_string(),
        docx_url: handle.docx().url.clone(),
    }))
}

/// Starts an offer-letter run for `applicant_id`.
///
/// Fails without touching the applicant's job state when the applicant,
/// their admission or a template for their program is missing, or when a
/// run is already in flight.
pub async fn send_letter(
    applicant_id: i64,
    pipeline: &OfferPipeline,
    jobs: &JobsState,
) -> Result<OfferJobHandle, OfferLetterError> {
    let db = pipeline.database().clone();
    let (applicant, template) = web::block(move || -> Result<_, OfferLetterError> {
        let conn = db.open()?;
        let applicant = records::load_admitted(&conn, applicant_id)?;
        let template = store::select_for_program(&conn, applicant.program_id)?;
        Ok((applicant, template))
    })
    .await??;

    let lease = jobs.claim(applicant_id)?;
    info!(
        "offer letter run {} for applicant {} uses template {} ('{}')",
        lease.run_id(),
        applicant_id,
        template.id,
        template.name
    );

    let media = pipeline.media().clone();
    let values = context::build(&applicant);
    let docx = web::block(move || -> Result<Vec<u8>, OfferLetterError> {
        let source = media.read(&template.file_path)?;
        Ok(render::render(&source, &values)?)
    })
    .await??;

    Ok(pipeline.start(lease, &applicant, docx).await?)
}
