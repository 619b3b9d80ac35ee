use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub payprop: PayPropConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: String,
}

/// PayProp agency API access
#[derive(Debug, Clone, Deserialize)]
pub struct PayPropConfig {
    pub base_url: String,
    /// Sync endpoints are disabled when no token is configured
    pub access_token: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub api_key_secret: String,
    pub rate_limit_per_minute: u32,
}

/// Reads an environment variable, falling back to `default` when unset
pub(crate) fn env_or<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            payprop: PayPropConfig {
                base_url: env::var("PAYPROP_API_BASE").unwrap_or_else(|_| {
                    "https://ukapi.staging.payprop.com/api/agency/v1.1".to_string()
                }),
                access_token: env::var("PAYPROP_ACCESS_TOKEN")
                    .ok()
                    .filter(|token| !token.trim().is_empty()),
                page_size: env_or("PAYPROP_PAGE_SIZE", "25")?,
                max_pages: env_or("PAYPROP_MAX_PAGES", "100")?,
                rate_limit_delay_ms: env_or("PAYPROP_RATE_LIMIT_DELAY_MS", "250")?,
                max_retries: env_or("PAYPROP_MAX_RETRIES", "3")?,
            },
            security: SecurityConfig {
                api_key_secret: env::var("API_KEY_SECRET")
                    .map_err(|_| AppError::Configuration("API_KEY_SECRET not set".to_string()))?,
                rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", "600")?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.security.rate_limit_per_minute == 0 {
            return Err(AppError::Configuration(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if self.security.api_key_secret.len() < 16 {
            return Err(AppError::Configuration(
                "API_KEY_SECRET must be at least 16 characters".to_string(),
            ));
        }

        if self.database.pool_size == 0 || self.database.pool_size > self.database.max_connections
        {
            return Err(AppError::Configuration(
                "DATABASE_POOL_SIZE must be between 1 and DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        self.payprop.validate()
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

impl PayPropConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.page_size) {
            return Err(AppError::Configuration(
                "PAYPROP_PAGE_SIZE must be between 1 and 1000".to_string(),
            ));
        }

        if self.max_pages == 0 {
            return Err(AppError::Configuration(
                "PAYPROP_MAX_PAGES must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.access_token.is_some()
    }
}

impl Default for PayPropConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ukapi.staging.payprop.com/api/agency/v1.1".to_string(),
            access_token: None,
            page_size: 25,
            max_pages: 100,
            rate_limit_delay_ms: 250,
            max_retries: 3,
        }
    }
}
