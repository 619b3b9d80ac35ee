use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::transactions::models::TransactionListQuery;
use crate::modules::transactions::services::TransactionImportService;

/// POST /api/historical-transactions/import
///
/// Body is the raw CSV file
pub async fn import_transactions(
    service: web::Data<Arc<TransactionImportService>>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    if body.is_empty() {
        return Err(AppError::validation("CSV body is empty"));
    }
    let report = service.import_csv(&body).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// GET /api/historical-transactions
pub async fn list_transactions(
    service: web::Data<Arc<TransactionImportService>>,
    user: AuthenticatedUser,
    query: web::Query<TransactionListQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let transactions = service
        .list(query.property_id, query.limit, query.offset)
        .await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// GET /api/historical-transactions/{id}
pub async fn get_transaction(
    service: web::Data<Arc<TransactionImportService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let id = path.into_inner();
    let transaction = service
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Historical transaction {}", id)))?;
    Ok(HttpResponse::Ok().json(transaction))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/historical-transactions")
            .route("", web::get().to(list_transactions))
            .route("/import", web::post().to(import_transactions))
            .route("/{id}", web::get().to(get_transaction)),
    );
}
