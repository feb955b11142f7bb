use super::store;
use crate::db::Database;
use crate::services::offer_letter::error::OfferLetterError;
use actix_web::{web, HttpResponse};

pub(crate) async fn process(db: web::Data<Database>) -> Result<HttpResponse, OfferLetterError> {
    let db = db.get_ref().clone();
    let templates = web::block(move || -> Result<_, OfferLetterError> {
        let conn = db.open()?;
        Ok(store::list(&conn)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(templates))
}
