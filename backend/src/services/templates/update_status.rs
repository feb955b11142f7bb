use super::store;
use crate::db::Database;
use crate::services::offer_letter::error::OfferLetterError;
use actix_web::{web, HttpResponse};
use common::requests::UpdateTemplateStatusRequest;
use log::info;

pub(crate) async fn process(
    template_id: web::Path<i64>,
    payload: web::Json<UpdateTemplateStatusRequest>,
    db: web::Data<Database>,
) -> Result<HttpResponse, OfferLetterError> {
    let template_id = template_id.into_inner();
    let status = payload.into_inner().status;
    let db = db.get_ref().clone();

    let template = web::block(move || -> Result<_, OfferLetterError> {
        let conn = db.open()?;
        Ok(store::set_status(&conn, template_id, status)?)
    })
    .await??;

    info!("template {} is now {}", template.id, template.status);
    Ok(HttpResponse::Ok().json(template))
}
