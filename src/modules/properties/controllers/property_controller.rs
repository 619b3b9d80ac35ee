use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, FINANCE, STAFF};
use crate::modules::properties::models::{NewProperty, OccupancyStatus, PropertyFilter};
use crate::modules::properties::services::VacancyService;

/// Query parameters for listing properties
#[derive(Debug, Deserialize)]
pub struct ListPropertiesQuery {
    pub occupancy_status: Option<OccupancyStatus>,
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
pub struct NoticeGivenRequest {
    pub notice_date: NaiveDate,
    pub expected_vacancy_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailableRequest {
    pub available_from: Option<NaiveDate>,
}

/// POST /api/properties
pub async fn create_property(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    request: web::Json<NewProperty>,
) -> Result<HttpResponse, AppError> {
    user.require_any(FINANCE)?;
    let property = service.create_property(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(property))
}

/// GET /api/properties
pub async fn list_properties(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    query: web::Query<ListPropertiesQuery>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let query = query.into_inner();
    let filter = PropertyFilter {
        occupancy_status: query.occupancy_status,
        owner_id: query.owner_id,
        block_property_id: query.block_property_id,
        limit: query.limit.clamp(1, 500),
        offset: query.offset.max(0),
    };
    let properties = service.list_properties(&filter).await?;
    Ok(HttpResponse::Ok().json(properties))
}

/// GET /api/properties/{id}
pub async fn get_property(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service.get_property(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

/// GET /api/properties/attention
pub async fn properties_needing_attention(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let properties = service
        .properties_needing_attention(Utc::now().date_naive())
        .await?;
    Ok(HttpResponse::Ok().json(properties))
}

/// POST /api/properties/{id}/notice-given
pub async fn mark_notice_given(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    request: web::Json<NoticeGivenRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service
        .mark_notice_given(
            path.into_inner(),
            request.notice_date,
            request.expected_vacancy_date,
        )
        .await?;
    Ok(HttpResponse::Ok().json(property))
}

/// POST /api/properties/{id}/advertising
pub async fn start_advertising(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service
        .start_advertising(path.into_inner(), Utc::now().date_naive())
        .await?;
    Ok(HttpResponse::Ok().json(property))
}

/// POST /api/properties/{id}/available
pub async fn mark_available(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    request: web::Json<AvailableRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let available_from = request
        .available_from
        .unwrap_or_else(|| Utc::now().date_naive());
    let property = service
        .mark_available(path.into_inner(), available_from)
        .await?;
    Ok(HttpResponse::Ok().json(property))
}

/// POST /api/properties/{id}/occupied
pub async fn mark_occupied(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service.mark_occupied(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

/// POST /api/properties/{id}/maintenance
pub async fn mark_maintenance(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service.mark_maintenance(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

/// POST /api/properties/{id}/off-market
pub async fn take_off_market(
    service: web::Data<Arc<VacancyService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let property = service.take_off_market(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

/// Configure property routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/properties")
            .route("", web::post().to(create_property))
            .route("", web::get().to(list_properties))
            .route("/attention", web::get().to(properties_needing_attention))
            .route("/{id}", web::get().to(get_property))
            .route("/{id}/notice-given", web::post().to(mark_notice_given))
            .route("/{id}/advertising", web::post().to(start_advertising))
            .route("/{id}/available", web::post().to(mark_available))
            .route("/{id}/occupied", web::post().to(mark_occupied))
            .route("/{id}/maintenance", web::post().to(mark_maintenance))
            .route("/{id}/off-market", web::post().to(take_off_market)),
    );
}
