use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PayPropConfig;
use crate::core::{AppError, Result};
use crate::modules::payprop::models::PayPropPage;

pub const ALL_PAYMENTS_ENDPOINT: &str = "/report/all-payments";

/// Page size and politeness limits for paginated exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLimits {
    pub page_size: u32,
    pub max_pages: u32,
    pub delay: Duration,
}

impl From<&PayPropConfig> for PagingLimits {
    fn from(config: &PayPropConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            delay: Duration::from_millis(config.rate_limit_delay_ms),
        }
    }
}

/// Read access to the PayProp agency API
#[async_trait]
pub trait PayPropApi: Send + Sync {
    fn paging(&self) -> PagingLimits;

    async fn fetch_page(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        page: u32,
        rows: u32,
    ) -> Result<PayPropPage>;

    /// Follows pagination until the last page or `max_pages`
    async fn fetch_all(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<Value>> {
        let limits = self.paging();
        let mut items = Vec::new();
        let mut page = 1;

        while page <= limits.max_pages {
            if page > 1 && !limits.delay.is_zero() {
                tokio::time::sleep(limits.delay).await;
            }

            let result = self
                .fetch_page(endpoint, params, page, limits.page_size)
                .await?;
            let has_next = result.has_next(page, limits.page_size);
            debug!(endpoint, page, count = result.items.len(), "PayProp page fetched");
            items.extend(result.items);

            if !has_next {
                break;
            }
            page += 1;
        }

        if page > limits.max_pages {
            warn!(endpoint, max_pages = limits.max_pages, "PayProp page limit reached");
        }
        info!(endpoint, total = items.len(), "PayProp export complete");
        Ok(items)
    }
}

/// Bearer-token client with retries on transient failures
pub struct PayPropClient {
    client: ClientWithMiddleware,
    base_url: String,
    access_token: String,
    limits: PagingLimits,
}

impl PayPropClient {
    pub fn new(config: &PayPropConfig) -> Result<Self> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| AppError::Configuration("PAYPROP_ACCESS_TOKEN not set".to_string()))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            limits: PagingLimits::from(config),
        })
    }
}

#[async_trait]
impl PayPropApi for PayPropClient {
    fn paging(&self) -> PagingLimits {
        self.limits
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        page: u32,
        rows: u32,
    ) -> Result<PayPropPage> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(params)
            .query(&[("page", page), ("rows", rows)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::unauthorized(format!(
                "PayProp rejected credentials for {} ({})",
                endpoint, status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external(format!(
                "PayProp {} returned {}: {}",
                endpoint, status, body
            )));
        }

        let body: Value = response.json().await?;
        Ok(PayPropPage::from_value(body))
    }
}
