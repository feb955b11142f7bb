use super::store::{self, TemplateChanges};
use super::upload::{bad_request, read_form, TemplateDocument};
use crate::db::Database;
use crate::media::MediaStore;
use crate::services::offer_letter::error::OfferLetterError;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use common::model::template::TemplateUploadResponse;
use common::requests::EditTemplateRequest;
use log::info;

pub(crate) async fn process(
    template_id: web::Path<i64>,
    payload: Multipart,
    db: web::Data<Database>,
    media: web::Data<MediaStore>,
) -> Result<HttpResponse, OfferLetterError> {
    let edited = edit_template(
        template_id.into_inner(),
        payload,
        db.get_ref().clone(),
        media.get_ref().clone(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(edited))
}

/// Changes a template's name, status, program bindings or document.
///
/// Takes the same multipart form as the upload; every part is optional.
/// A replaced document is deleted once no template refers to it.
pub async fn edit_template(
    template_id: i64,
    payload: Multipart,
    db: Database,
    media: MediaStore,
) -> Result<TemplateUploadResponse, OfferLetterError> {
    let form = read_form::<EditTemplateRequest>(payload).await?;
    let request = form.metadata.unwrap_or_default();
    if request.programs.as_ref().is_some_and(|programs| programs.is_empty()) {
        return Err(bad_request("A template must be bound to at least one program"));
    }
    let scanned = form.file.as_ref().map(TemplateDocument::scan).transpose()?;
    let document = form.file;
    let name = request.name.filter(|name| !name.trim().is_empty());

    let (template, scanned) = web::block(move || -> Result<_, OfferLetterError> {
        let mut conn = db.open()?;
        store::load(&conn, template_id)?;

        let file = match &document {
            Some(document) => Some(media.save(&document.stored_path(), &document.bytes)?),
            None => None,
        };
        let (previous, template) = store::update(
            &mut conn,
            template_id,
            TemplateChanges {
                name,
                status: request.status,
                programs: request.programs,
                file,
            },
        )?;
        if previous.file_path != template.file_path
            && !store::is_file_referenced(&conn, &previous.file_path)?
        {
            media.remove(&previous.file_path)?;
        }

        let scanned = match scanned {
            Some(scanned) => scanned,
            None => TemplateDocument {
                filename: template.file_path.clone(),
                bytes: media.read(&template.file_path)?,
            }
            .scan()?,
        };
        Ok((template, scanned))
    })
    .await??;

    info!(
        "template {} ('{}') edited, programs {:?}",
        template.id, template.name, template.programs
    );
    Ok(TemplateUploadResponse {
        template,
        placeholders: scanned.placeholders,
        unknown_placeholders: scanned.unknown,
    })
}
