use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::balances::services::BalanceService;
use crate::modules::properties::models::PropertyFilter;

#[derive(Debug, Deserialize)]
pub struct ListBalancesQuery {
    pub owner_id: Option<i64>,
    pub block_property_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct LedgerQueryParams {
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    #[default]
    Credit,
    Debit,
}

#[derive(Debug, Deserialize)]
pub struct AdjustBalanceRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub adjustment_type: AdjustmentDirection,
    pub description: String,
    pub notes: Option<String>,
}

impl AdjustBalanceRequest {
    /// Debits are sent as positive amounts and negated here
    pub fn signed_amount(&self) -> Decimal {
        match self.adjustment_type {
            AdjustmentDirection::Credit => self.amount,
            AdjustmentDirection::Debit => -self.amount.abs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpeningBalanceRequest {
    pub amount: Decimal,
    pub as_of_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to_property_id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
struct BalanceAsOfResponse {
    property_id: i64,
    date: NaiveDate,
    balance: Decimal,
}

#[derive(Debug, Serialize)]
struct OwnerTotalResponse {
    owner_id: i64,
    total_balance: Decimal,
}

/// GET /api/property-balances
pub async fn list_balances(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    query: web::Query<ListBalancesQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let filter = PropertyFilter {
        owner_id: query.owner_id,
        block_property_id: query.block_property_id,
        limit: query.limit.clamp(1, 500),
        offset: query.offset.max(0),
        ..PropertyFilter::default()
    };
    Ok(HttpResponse::Ok().json(service.list_summaries(&filter).await?))
}

/// GET /api/property-balances/{id}
pub async fn get_balance(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    Ok(HttpResponse::Ok().json(service.summary(path.into_inner()).await?))
}

/// GET /api/property-balances/{id}/ledger
pub async fn get_ledger(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<LedgerQueryParams>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let page = service
        .ledger_history(path.into_inner(), query.from, query.to, query.page, query.size)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/property-balances/{id}/as-of?date=
pub async fn balance_as_of(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<AsOfQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property_id = path.into_inner();
    let balance = service.balance_as_of(property_id, query.date).await?;
    Ok(HttpResponse::Ok().json(BalanceAsOfResponse {
        property_id,
        date: query.date,
        balance,
    }))
}

/// POST /api/property-balances/{id}/adjust
pub async fn adjust_balance(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    request: web::Json<AdjustBalanceRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let request = request.into_inner();
    let entry = service
        .adjust(
            path.into_inner(),
            request.signed_amount(),
            &request.description,
            request.notes,
            Some(user.user_id),
        )
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

/// POST /api/property-balances/{id}/opening-balance
pub async fn set_opening_balance(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    request: web::Json<OpeningBalanceRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let request = request.into_inner();
    let entry = service
        .set_opening_balance(
            path.into_inner(),
            request.amount,
            request.as_of_date,
            request.notes,
            Some(user.user_id),
        )
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

/// POST /api/property-balances/{id}/transfer
pub async fn transfer_balance(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    request: web::Json<TransferRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let request = request.into_inner();
    let result = service
        .transfer(
            path.into_inner(),
            request.to_property_id,
            request.amount,
            request.description.as_deref(),
            Some(user.user_id),
        )
        .await?;
    Ok(HttpResponse::Created().json(result))
}

/// POST /api/property-balances/{id}/recalculate
pub async fn recalculate_balance(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let property_id = path.into_inner();
    service.recalculate_balance(property_id).await?;
    Ok(HttpResponse::Ok().json(service.summary(property_id).await?))
}

/// GET /api/property-balances/block/{id}/contributions
pub async fn unit_contributions(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let contributions = service
        .unit_contributions(path.into_inner(), query.from, query.to)
        .await?;
    Ok(HttpResponse::Ok().json(contributions))
}

/// GET /api/property-balances/owner/{owner_id}/total
pub async fn owner_total(
    service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let owner_id = path.into_inner();
    let total_balance = service.total_balance_for_owner(owner_id).await?;
    Ok(HttpResponse::Ok().json(OwnerTotalResponse {
        owner_id,
        total_balance,
    }))
}

/// Configure property balance routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/property-balances")
            .route("", web::get().to(list_balances))
            .route("/block/{id}/contributions", web::get().to(unit_contributions))
            .route("/owner/{owner_id}/total", web::get().to(owner_total))
            .route("/{id}", web::get().to(get_balance))
            .route("/{id}/ledger", web::get().to(get_ledger))
            .route("/{id}/as-of", web::get().to(balance_as_of))
            .route("/{id}/adjust", web::post().to(adjust_balance))
            .route("/{id}/opening-balance", web::post().to(set_opening_balance))
            .route("/{id}/transfer", web::post().to(transfer_balance))
            .route("/{id}/recalculate", web::post().to(recalculate_balance)),
    );
}
