use crate::core::error::Result as AppResult;
use crate::core::AppError;
use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::MySqlPool;
use std::fmt;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Paths served without an API key
const PUBLIC_PATHS: &[&str] = &["/", "/health", "/ready"];

/// CRM user roles, ordered from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Employee,
    Owner,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
            Role::Owner => "OWNER",
            Role::Customer => "CUSTOMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROLE_{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        match name.strip_prefix("ROLE_").unwrap_or(&name) {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "EMPLOYEE" => Ok(Role::Employee),
            "OWNER" => Ok(Role::Owner),
            "CUSTOMER" => Ok(Role::Customer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Staff allowed to read CRM data
pub const STAFF: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Manager, Role::Employee];

/// Staff allowed to move money: batches, ledger adjustments, transfers
pub const FINANCE: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Manager];

/// Property owners using the self-service endpoints
pub const OWNERS: &[Role] = &[Role::Owner];

/// Identity attached to a request by [`ApiKeyAuth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
    /// Customer record for owners and tenants
    pub customer_id: Option<i64>,
}

impl AuthenticatedUser {
    pub fn require_any(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.user_id, role = %self.role, "Role not permitted");
            Err(AppError::forbidden(format!(
                "{} may not perform this operation",
                self.role
            )))
        }
    }

    /// Customer id of an owner, required by owner self-service endpoints
    pub fn owner_customer_id(&self) -> AppResult<i64> {
        self.require_any(OWNERS)?;
        self.customer_id
            .ok_or_else(|| AppError::forbidden("Owner account is not linked to a customer"))
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::unauthorized("Authentication required")),
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub user_id: i64,
    pub role: String,
    pub customer_id: Option<i64>,
    pub is_active: bool,
}

impl ApiKeyRecord {
    pub fn to_user(&self) -> AppResult<AuthenticatedUser> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| AppError::internal(format!("API key {}: {}", self.id, e)))?;
        Ok(AuthenticatedUser {
            user_id: self.user_id,
            role,
            customer_id: self.customer_id,
        })
    }
}

/// Lookup of hashed API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_active(&self, key_hash: &str) -> AppResult<Option<ApiKeyRecord>>;
}

pub struct MySqlApiKeyStore {
    pool: MySqlPool,
}

impl MySqlApiKeyStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for MySqlApiKeyStore {
    async fn find_active(&self, key_hash: &str) -> AppResult<Option<ApiKeyRecord>> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(
            r#"
            SELECT id, user_id, role, customer_id, is_active
            FROM api_keys
            WHERE key_hash = ? AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref record) = record {
            // last_used_at is informational only
            if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = ?")
                .bind(record.id)
                .execute(&self.pool)
                .await
            {
                tracing::warn!(api_key_id = record.id, error = %e, "Failed to touch API key");
            }
        }

        Ok(record)
    }
}

/// Keyed hash of an API key, as stored in `api_keys.key_hash`
pub fn hash_api_key(secret: &str, api_key: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid API key secret: {}", e)))?;
    mac.update(api_key.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// API Key authentication middleware
#[derive(Clone)]
pub struct ApiKeyAuth {
    store: Arc<dyn ApiKeyStore>,
    secret: Arc<str>,
}

impl ApiKeyAuth {
    pub fn new(store: Arc<dyn ApiKeyStore>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service: Rc::new(service),
            store: self.store.clone(),
            secret: self.secret.clone(),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: Rc<S>,
    store: Arc<dyn ApiKeyStore>,
    secret: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let store = self.store.clone();
        let secret = self.secret.clone();

        Box::pin(async move {
            if PUBLIC_PATHS.contains(&req.path()) {
                return svc.call(req).await.map(|res| res.map_into_right_body());
            }

            match authenticate(&req, store.as_ref(), &secret).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    svc.call(req).await.map(|res| res.map_into_right_body())
                }
                Err(e) => {
                    tracing::warn!(path = %req.path(), error = %e, "Rejected request");
                    let response = e.error_response();
                    Ok(req.into_response(response).map_into_left_body())
                }
            }
        })
    }
}

async fn authenticate(
    req: &ServiceRequest,
    store: &dyn ApiKeyStore,
    secret: &str,
) -> AppResult<AuthenticatedUser> {
    let api_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing X-API-Key header"))?;

    let key_hash = hash_api_key(secret, api_key)?;
    let record = store
        .find_active(&key_hash)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid API key"))?;

    if !record.is_active {
        return Err(AppError::unauthorized("API key is inactive"));
    }

    record.to_user()
}
