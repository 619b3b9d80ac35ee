pub mod auth;
pub mod error_handler;
pub mod rate_limit;
pub mod request_id;

pub use auth::{
    hash_api_key, ApiKeyAuth, ApiKeyRecord, ApiKeyStore, AuthenticatedUser, MySqlApiKeyStore,
    Role, FINANCE, OWNERS, STAFF,
};
pub use error_handler::ErrorLogger;
pub use rate_limit::RateLimiter;
pub use request_id::{RequestId, RequestIdValue};
