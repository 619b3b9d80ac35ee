use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::allocations::models::AllocationFilter;
use crate::modules::allocations::services::AllocationService;
use crate::modules::batches::models::{BatchRequest, BatchStatus, BatchType};
use crate::modules::batches::services::{BatchAdjustment, BatchService};

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub allocation_ids: Vec<i64>,
    pub batch_type: BatchType,
    pub payment_date: NaiveDate,
    pub beneficiary_id: i64,
    pub beneficiary_name: Option<String>,
    pub notes: Option<String>,
    /// Pays this instead of the allocation total, settling the difference
    /// against property balances
    pub actual_payment_amount: Option<Decimal>,
}

impl CreateBatchRequest {
    fn split(self, created_by: i64) -> (BatchRequest, Option<Decimal>) {
        (
            BatchRequest {
                allocation_ids: self.allocation_ids,
                batch_type: self.batch_type,
                payment_date: self.payment_date,
                beneficiary_id: self.beneficiary_id,
                beneficiary_name: self.beneficiary_name,
                notes: self.notes,
                created_by: Some(created_by),
            },
            self.actual_payment_amount,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub paid_date: NaiveDate,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SingleBatchQuery {
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PendingAllocationsQuery {
    pub beneficiary_id: Option<i64>,
    pub property_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl PendingAllocationsQuery {
    fn to_filter(&self) -> AllocationFilter {
        AllocationFilter {
            beneficiary_id: self.beneficiary_id,
            property_id: self.property_id,
            limit: self.limit.clamp(1, 500),
            offset: self.offset.max(0),
            ..AllocationFilter::pending()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub status: Option<BatchStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/payment-batches/pending-allocations
pub async fn pending_allocations(
    allocations: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    query: web::Query<PendingAllocationsQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(allocations.list(&query.to_filter()).await?))
}

/// GET /api/payment-batches/pending-allocations/property/{property_id}
pub async fn pending_allocations_for_property(
    allocations: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let pending = allocations
        .pending_for_property(path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// GET /api/payment-batches/pending-total
pub async fn pending_total(
    allocations: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    query: web::Query<PendingAllocationsQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let totals = allocations.pending_totals(&query.to_filter()).await?;
    Ok(HttpResponse::Ok().json(totals))
}

/// GET /api/payment-batches?status=
pub async fn list_batches(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    query: web::Query<BatchListQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);
    let batches = match query.status {
        Some(status) => service.list_by_status(status, limit, offset).await?,
        None => service.list_pending(limit, offset).await?,
    };
    Ok(HttpResponse::Ok().json(batches))
}

/// GET /api/payment-batches/pending
pub async fn pending_batches(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    query: web::Query<BatchListQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let batches = service
        .list_pending(query.limit.clamp(1, 500), query.offset.max(0))
        .await?;
    Ok(HttpResponse::Ok().json(batches))
}

/// GET /api/payment-batches/{batch_id}
pub async fn get_batch(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let batch = service.get_batch_with_allocations(&path).await?;
    Ok(HttpResponse::Ok().json(batch))
}

/// POST /api/payment-batches/create
pub async fn create_batch(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    request: web::Json<CreateBatchRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let (request, actual_payment) = request.into_inner().split(user.user_id);
    let created = match actual_payment {
        Some(actual) => {
            service
                .create_batch_with_actual_amount(request, actual)
                .await?
        }
        None => service.create_batch(request).await?,
    };
    Ok(HttpResponse::Created().json(created))
}

/// POST /api/payment-batches/create-single/{allocation_id}
pub async fn create_single_batch(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<SingleBatchQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let payment_date = query
        .payment_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let created = service
        .create_single_allocation_batch(path.into_inner(), payment_date, Some(user.user_id))
        .await?;
    Ok(HttpResponse::Created().json(created))
}

/// POST /api/payment-batches/{batch_id}/adjust
pub async fn adjust_batch(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<BatchAdjustment>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let batch = service
        .add_balance_adjustment(&path, request.into_inner(), Some(user.user_id))
        .await?;
    Ok(HttpResponse::Ok().json(batch))
}

/// POST /api/payment-batches/{batch_id}/pending
pub async fn mark_pending(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    Ok(HttpResponse::Ok().json(service.mark_pending(&path).await?))
}

/// POST /api/payment-batches/{batch_id}/paid
pub async fn mark_paid(
    service: web::Data<Arc<BatchService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<MarkPaidRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let request = request.into_inner();
    let batch = service
        .mark_paid(&path, request.paid_date, request.payment_reference)
        .await?;
    Ok(HttpResponse::Ok().json(batch))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/payment-batches")
            .route("", web::get().to(list_batches))
            .route("/pending-allocations", web::get().to(pending_allocations))
            .route(
                "/pending-allocations/property/{property_id}",
                web::get().to(pending_allocations_for_property),
            )
            .route("/pending-total", web::get().to(pending_total))
            .route("/pending", web::get().to(pending_batches))
            .route("/create", web::post().to(create_batch))
            .route(
                "/create-single/{allocation_id}",
                web::post().to(create_single_batch),
            )
            .route("/{batch_id}", web::get().to(get_batch))
            .route("/{batch_id}/adjust", web::post().to(adjust_batch))
            .route("/{batch_id}/pending", web::post().to(mark_pending))
            .route("/{batch_id}/paid", web::post().to(mark_paid)),
    );
}
