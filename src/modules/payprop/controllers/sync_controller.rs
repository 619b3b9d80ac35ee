use std::sync::Arc;

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::payprop::services::SyncSupervisor;

/// POST /api/payprop/sync/payments
///
/// Returns 202 with the queued job; poll its status for the outcome
pub async fn start_payment_sync(
    supervisor: web::Data<Arc<SyncSupervisor>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let job = supervisor.start_payment_sync().await?;
    Ok(HttpResponse::Accepted().json(job))
}

/// GET /api/payprop/sync
pub async fn list_jobs(
    supervisor: web::Data<Arc<SyncSupervisor>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(supervisor.list().await))
}

/// GET /api/payprop/sync/{job_id}
pub async fn job_status(
    supervisor: web::Data<Arc<SyncSupervisor>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(supervisor.status(path.into_inner()).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/payprop/sync")
            .route("", web::get().to(list_jobs))
            .route("/payments", web::post().to(start_payment_sync))
            .route("/{job_id}", web::get().to(job_status)),
    );
}
