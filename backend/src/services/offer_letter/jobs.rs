use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};

/// `GET /api/offer_letter/jobs`: runs currently holding a lease.
pub(crate) async fn process(state: web::Data<JobsState>) -> impl Responder {
    HttpResponse::Ok().json(state.in_flight().await)
}
