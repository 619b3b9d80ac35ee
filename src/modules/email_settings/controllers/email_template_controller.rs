use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::middleware::auth::{AuthenticatedUser, STAFF};
use crate::modules::email_settings::models::{NewEmailTemplate, SettingsKind};
use crate::modules::email_settings::services::EmailSettingsService;

#[derive(Debug, Deserialize)]
pub struct SetTriggerRequest {
    pub enabled: bool,
    pub template_id: Option<i64>,
}

fn parse_kind(kind: &str) -> Result<SettingsKind, AppError> {
    kind.parse().map_err(AppError::Validation)
}

/// POST /employee/email-templates
pub async fn create_template(
    service: web::Data<Arc<EmailSettingsService>>,
    user: AuthenticatedUser,
    request: web::Json<NewEmailTemplate>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let template = service
        .create_template(user.user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(template))
}

/// DELETE /employee/email-templates/{id}
pub async fn delete_template(
    service: web::Data<Arc<EmailSettingsService>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    service.delete_template(user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /employee/email-templates/settings/{kind}
pub async fn get_settings(
    service: web::Data<Arc<EmailSettingsService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let kind = parse_kind(&path)?;
    Ok(HttpResponse::Ok().json(service.get_settings(user.user_id, kind).await?))
}

/// PUT /employee/email-templates/settings/{kind}/{trigger}
pub async fn set_trigger(
    service: web::Data<Arc<EmailSettingsService>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
    request: web::Json<SetTriggerRequest>,
) -> Result<HttpResponse, AppError> {
    user.require_any(STAFF)?;
    let (kind, trigger) = path.into_inner();
    let kind = parse_kind(&kind)?;
    let settings = service
        .set_trigger(
            user.user_id,
            kind,
            &trigger,
            request.enabled,
            request.template_id,
        )
        .await?;
    Ok(HttpResponse::Ok().json(settings))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/employee/email-templates")
            .route("", web::post().to(create_template))
            .route("/settings/{kind}", web::get().to(get_settings))
            .route("/settings/{kind}/{trigger}", web::put().to(set_trigger))
            .route("/{id}", web::delete().to(delete_template)),
    );
}
