use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::leases::models::NewLease;
use crate::modules::leases::services::LeaseService;

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// POST /api/leases
pub async fn create_lease(
    service: web::Data<Arc<LeaseService>>,
    user: AuthenticatedUser,
    request: web::Json<NewLease>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let lease = service.create_lease(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(lease))
}

/// GET /api/leases/{id}
pub async fn get_lease(
    service: web::Data<Arc<LeaseService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(service.get(path.into_inner()).await?))
}

/// GET /api/leases/property/{property_id}
pub async fn leases_for_property(
    service: web::Data<Arc<LeaseService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let leases = service.list_by_property(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leases))
}

/// GET /api/leases/{id}/schedule?from=&to=
pub async fn lease_schedule(
    service: web::Data<Arc<LeaseService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<ScheduleQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let dates = service
        .schedule(path.into_inner(), query.from, query.to)
        .await?;
    Ok(HttpResponse::Ok().json(dates))
}

/// POST /api/leases/import
pub async fn import_leases(
    service: web::Data<Arc<LeaseService>>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    if body.is_empty() {
        return Err(AppError::validation("CSV body is empty"));
    }
    Ok(HttpResponse::Ok().json(service.import_csv(&body).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/leases")
            .route("", web::post().to(create_lease))
            .route("/import", web::post().to(import_leases))
            .route("/property/{property_id}", web::get().to(leases_for_property))
            .route("/{id}", web::get().to(get_lease))
            .route("/{id}/schedule", web::get().to(lease_schedule)),
    );
}
