use super::error::OfferLetterError;
use super::pipeline::OfferPipeline;
use super::records;
use actix_web::{web, HttpResponse};
use common::model::offer::OfferLetterStatus;

/// `GET /api/offer_letter/status/{applicant_id}`
pub(crate) async fn process(
    applicant_id: web::Path<i64>,
    pipeline: web::Data<OfferPipeline>,
) -> Result<HttpResponse, OfferLetterError> {
    let status = offer_letter_status(applicant_id.into_inner(), &pipeline).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// Current phase, progress and artifact URLs. Reads only.
pub async fn offer_letter_status(
    applicant_id: i64,
    pipeline: &OfferPipeline,
) -> Result<OfferLetterStatus, OfferLetterError> {
    let db = pipeline.database().clone();
    let media = pipeline.media().clone();
    let status = web::block(move || -> Result<_, OfferLetterError> {
        let conn = db.open()?;
        Ok(records::read_status(&conn, &media, applicant_id)?)
    })
    .await??;
    Ok(status)
}
