//! # Offer Letter Service Module
//!
//! Generates offer letters for admitted applicants and reports on their
//! progress. Routes are mounted under `/api/offer_letter`:
//!
//! - `POST /send_letter/{applicant_id}`: render the letter and start the
//!   background run (`send::process`).
//! - `GET /status/{applicant_id}`: phase, progress and artifact URLs
//!   (`status::process`).
//! - `GET /jobs`: runs currently in flight (`jobs::process`).
//!
//! The template administration routes from `services::templates` share the
//! same scope.

pub mod context;
pub mod convert;
pub mod error;
mod jobs;
pub mod notify;
pub mod pipeline;
pub mod records;
pub mod render;
mod send;
mod status;

pub use send::send_letter;
pub use status::offer_letter_status;

use crate::services::templates;
use actix_web::web::{get, post, scope};
use actix_web::Scope;

pub const API_PATH: &str = "/api/offer_letter";

/// Configures and returns the Actix `Scope` for all offer-letter routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/send_letter/{applicant_id}", post().to(send::process))
        .route("/status/{applicant_id}", get().to(status::process))
        .route("/jobs", get().to(jobs::process))
        .configure(templates::configure)
}
