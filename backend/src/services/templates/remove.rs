use super::store;
use crate::db::Database;
use crate::media::MediaStore;
use crate::services::offer_letter::error::{Detail, OfferLetterError};
use actix_web::{web, HttpResponse};
use log::info;

pub(crate) async fn process(
    template_id: web::Path<i64>,
    db: web::Data<Database>,
    media: web::Data<MediaStore>,
) -> Result<HttpResponse, OfferLetterError> {
    let template_id = template_id.into_inner();
    let db = db.get_ref().clone();
    let media = media.get_ref().clone();

    web::block(move || -> Result<(), OfferLetterError> {
        let mut conn = db.open()?;
        let removed = store::delete(&mut conn, template_id)?;
        if !store::is_file_referenced(&conn, &removed.file_path)? {
            media.remove(&removed.file_path)?;
        }
        info!("template {} ('{}') deleted", removed.id, removed.name);
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(Detail {
        detail: "template deleted successfully",
    }))
}
