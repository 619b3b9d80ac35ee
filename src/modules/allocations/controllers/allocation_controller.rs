use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::allocations::models::{
    AllocationFilter, AllocationSource, AllocationType, NewAllocation, TransactionKey,
};
use crate::modules::allocations::services::{AllocationService, Beneficiary};

#[derive(Debug, Deserialize)]
pub struct CreateAllocationRequest {
    pub allocation_type: AllocationType,
    pub amount: Decimal,
    pub transaction_id: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub property_id: Option<i64>,
    pub beneficiary_id: Option<i64>,
    pub beneficiary_name: Option<String>,
}

impl CreateAllocationRequest {
    fn into_new_allocation(self) -> NewAllocation {
        NewAllocation {
            transaction: self.transaction_id.map(TransactionKey::Historical),
            allocation_type: self.allocation_type,
            amount: self.amount,
            category: self.category,
            description: self.description,
            property_id: self.property_id,
            property_name: None,
            beneficiary_id: self.beneficiary_id,
            beneficiary_name: self.beneficiary_name,
            source: AllocationSource::Manual,
            settled: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FromTransactionRequest {
    pub transaction_id: i64,
    pub allocation_type: AllocationType,
    pub beneficiary_id: i64,
    pub beneficiary_name: Option<String>,
}

/// POST /api/allocations
pub async fn create_allocation(
    service: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    request: web::Json<CreateAllocationRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let allocation = service
        .create_manual(request.into_inner().into_new_allocation())
        .await?;
    Ok(HttpResponse::Created().json(allocation))
}

/// POST /api/allocations/from-transaction
pub async fn create_from_transaction(
    service: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    request: web::Json<FromTransactionRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let request = request.into_inner();
    let allocation = service
        .create_from_transaction(
            request.transaction_id,
            Beneficiary {
                id: request.beneficiary_id,
                name: request.beneficiary_name,
            },
            request.allocation_type,
        )
        .await?;
    Ok(HttpResponse::Created().json(allocation))
}

/// GET /api/allocations
pub async fn list_allocations(
    service: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    query: web::Query<AllocationFilter>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let mut filter = query.into_inner();
    filter.limit = filter.limit.clamp(1, 500);
    filter.offset = filter.offset.max(0);
    Ok(HttpResponse::Ok().json(service.list(&filter).await?))
}

/// GET /api/allocations/{id}
pub async fn get_allocation(
    service: web::Data<Arc<AllocationService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(service.get(path.into_inner()).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/allocations")
            .route("", web::post().to(create_allocation))
            .route("", web::get().to(list_allocations))
            .route("/from-transaction", web::post().to(create_from_transaction))
            .route("/{id}", web::get().to(get_allocation)),
    );
}
