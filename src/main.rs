use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use propledger::config::{Config, DatabaseConfig};
use propledger::middleware::{ApiKeyAuth, ErrorLogger, MySqlApiKeyStore, RateLimiter, RequestId};
use propledger::modules::payprop::{PayPropApi, PayPropClient};
use propledger::{routes, AppServices, Repositories};

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("propledger={},actix_web=info,sqlx=warn", level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    init_tracing(&config.app.log_level, &config.app.log_format);

    tracing::info!(
        env = %config.app.env,
        bind = %config.server.bind_address(),
        "Starting PropLedger"
    );

    let pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;
    DatabaseConfig::migrate(&pool)
        .await
        .context("Failed to apply migrations")?;

    tracing::info!(
        pool_size = config.database.pool_size,
        max_connections = config.database.max_connections,
        "Database ready"
    );

    let payprop: Option<Arc<dyn PayPropApi>> = if config.payprop.is_enabled() {
        let client = PayPropClient::new(&config.payprop)
            .context("Failed to build PayProp client")?;
        tracing::info!(base_url = %config.payprop.base_url, "PayProp sync enabled");
        Some(Arc::new(client))
    } else {
        tracing::warn!("PAYPROP_ACCESS_TOKEN not set, PayProp sync disabled");
        None
    };

    let services = AppServices::build(Repositories::mysql(&pool), payprop);

    // Built once so limiter and key store state is shared by every worker
    let auth = ApiKeyAuth::new(
        Arc::new(MySqlApiKeyStore::new(pool.clone())),
        config.security.api_key_secret.clone(),
    );
    let rate_limiter = RateLimiter::new(config.security.rate_limit_per_minute);
    let payprop_config = config.payprop.clone();
    let production = config.is_production();

    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let cors = if production {
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                .allow_any_header()
                .max_age(3600)
        } else {
            Cors::permissive()
        };

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(payprop_config.clone()))
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .configure(|cfg| services.register(cfg))
            .configure(routes::configure)
            .wrap(auth.clone())
            .wrap(rate_limiter.clone())
            .wrap(ErrorLogger)
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .wrap(cors)
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}
