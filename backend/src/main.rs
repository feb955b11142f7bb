use actix_web::{web, App, HttpServer};
use backend::config::AppConfig;
use backend::db::Database;
use backend::job_controller::state::{start_job_updater, JobsState};
use backend::PortalState;
use env_logger::Env;
use log::info;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    env_logger::init_from_env(Env::default().default_filter_or(config.log_level.as_str()));

    Database::new(&config.storage.database)
        .init_schema()
        .map_err(io::Error::other)?;
    std::fs::create_dir_all(&config.storage.media_root)?;

    let (jobs_state, rx) = JobsState::new();
    tokio::spawn(start_job_updater(jobs_state.clone(), rx));

    let state = PortalState::from_config(&config, jobs_state);
    let addr = config.server.socket_addr().map_err(io::Error::other)?;
    info!(
        "Server running at http://{} (converter: {:?} '{}', media: {})",
        addr,
        config.converter.kind,
        config.converter.program,
        config.storage.media_root.display()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(1024 * 1024))
            .configure(backend::configure(state.clone()))
    })
    .bind(addr)?
    .run()
    .await
}
