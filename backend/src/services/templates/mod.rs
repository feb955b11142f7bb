//! # Offer Letter Template Module
//!
//! Administration of the DOCX templates offer letters are rendered from.
//! The routes are registered into the offer-letter scope, so they live
//! under `/api/offer_letter`:
//!
//! - `POST /upload_template`: multipart upload with a `json` part
//!   (`UploadTemplateRequest`) and a `file` part holding the `.docx`.
//! - `GET /list_templates`: every template with its program ids, newest first.
//! - `PUT /edit_template/{template_id}`: the upload form again, every part
//!   optional; changes the name, status, program bindings or document.
//! - `PUT /template_status/{template_id}`: switch a template between
//!   `active` and `inactive`.
//! - `DELETE /delete_template/{template_id}`: remove a template and, when no
//!   other template shares it, its stored file.

mod edit;
mod list;
mod remove;
pub mod store;
mod update_status;
mod upload;

use actix_web::web::{delete, get, post, put, ServiceConfig};

/// Media directory holding uploaded templates.
pub const TEMPLATE_DIR: &str = "offer_templates";

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.route("/upload_template", post().to(upload::process))
        .route("/list_templates", get().to(list::process))
        .route("/edit_template/{template_id}", put().to(edit::process))
        .route("/template_status/{template_id}", put().to(update_status::process))
        .route("/delete_template/{template_id}", delete().to(remove::process));
}
