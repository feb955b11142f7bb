//! Admissions portal backend: offer-letter generation and the template
//! administration behind it.

pub mod config;
pub mod db;
pub mod job_controller;
pub mod media;
pub mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::job_controller::state::JobsState;
use crate::media::MediaStore;
use crate::services::offer_letter::convert::{self, DocumentConverter};
use crate::services::offer_letter::notify::Notifications;
use crate::services::offer_letter::pipeline::OfferPipeline;
use actix_files::Files;
use actix_web::web::{self, ServiceConfig};
use std::sync::Arc;

/// State shared by every worker's `App`.
#[derive(Clone)]
pub struct PortalState {
    pub db: Database,
    pub media: MediaStore,
    pub jobs: JobsState,
    pub pipeline: OfferPipeline,
}

impl PortalState {
    pub fn new(
        db: Database,
        media: MediaStore,
        jobs: JobsState,
        converter: Arc<dyn DocumentConverter>,
        notifications: Notifications,
    ) -> Self {
        let pipeline = OfferPipeline::new(db.clone(), media.clone(), converter, notifications);
        Self {
            db,
            media,
            jobs,
            pipeline,
        }
    }

    /// Wires the configured converter and the database-backed notifiers.
    pub fn from_config(config: &AppConfig, jobs: JobsState) -> Self {
        let db = Database::new(&config.storage.database);
        let media = MediaStore::new(&config.storage.media_root, &config.storage.media_url);
        let notifications = Notifications::portal(&db, config.mail.clone());
        Self::new(db, media, jobs, convert::from_config(&config.converter), notifications)
    }
}

/// Registers shared state, the API routes and the media file server.
pub fn configure(state: PortalState) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mount = state.media.base_url().trim_end_matches('/').to_string();
        let media_root = state.media.root().to_path_buf();
        cfg.app_data(web::Data::new(state.db.clone()))
            .app_data(web::Data::new(state.media.clone()))
            .app_data(web::Data::new(state.jobs.clone()))
            .app_data(web::Data::new(state.pipeline.clone()))
            .service(services::offer_letter::configure_routes())
            .service(Files::new(&mount, media_root));
    }
}
