use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, STAFF};
use crate::modules::owner_payments::services::OwnerPaymentService;

/// GET /api/owner-payments/dashboard
pub async fn dashboard(
    service: web::Data<Arc<OwnerPaymentService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(service.dashboard().await?))
}

/// GET /property-owner/pending-allocations
pub async fn owner_pending_allocations(
    service: web::Data<Arc<OwnerPaymentService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let owner_id = user.owner_customer_id()?;
    let allocations = service.owner_pending_allocations(owner_id).await?;
    Ok(HttpResponse::Ok().json(allocations))
}

/// GET /property-owner/balances
pub async fn owner_balances(
    service: web::Data<Arc<OwnerPaymentService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let owner_id = user.owner_customer_id()?;
    Ok(HttpResponse::Ok().json(service.owner_balances(owner_id).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/owner-payments/dashboard", web::get().to(dashboard))
        .service(
            web::scope("/property-owner")
                .route("/pending-allocations", web::get().to(owner_pending_allocations))
                .route("/balances", web::get().to(owner_balances)),
        );
}
