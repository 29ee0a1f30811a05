//! Client for the xApp manager
//!
//! Two operations are used by the supervisor:
//!
//! - **status query**: `GET` the deployed-xApp descriptor, retried a bounded number of
//!   times with a fixed delay. An empty body counts as not ready yet.
//! - **subscription**: `POST` our webhook URL so topology changes are pushed to us,
//!   retried until the manager accepts it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::AppmgrConfig;
use crate::error::AppmgrError;

/// The module manager as seen by the supervision loop
#[async_trait]
pub trait ModuleManager: Send + Sync + 'static {
    /// Current xApp descriptor payload
    async fn fetch_status(&self) -> Result<Vec<u8>, AppmgrError>;

    /// Register `target_url` for topology notifications, returning the subscription id.
    ///
    /// Only returns an error when retrying cannot help.
    async fn subscribe(&self, target_url: &str) -> Result<String, AppmgrError>;
}

#[derive(Debug, Serialize)]
struct SubscriptionRequest<'a> {
    #[serde(rename = "Data")]
    data: SubscriptionData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionData<'a> {
    max_retries: u32,
    retry_timer: u32,
    event_type: &'a str,
    target_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    id: String,
}

/// HTTP client for the xApp manager REST API
#[derive(Debug, Clone)]
pub struct AppmgrClient {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    status_url: String,
    subscription_url: String,

    retries: usize,
    retry_delay: Duration,

    notification_max_retries: u32,
    notification_retry_timer: u32,
}

impl AppmgrClient {
    pub fn new(config: &AppmgrConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout())
                .build()
                .expect("Failed to build HTTP client"),
            status_url: config.status_url(),
            subscription_url: config.subscription_url(),
            retries: config.retries.max(1),
            retry_delay: config.retry_delay(),
            notification_max_retries: config.notification_max_retries,
            notification_retry_timer: config.notification_retry_timer,
        }
    }

    /// Query the xApp status, retrying up to the configured attempt bound.
    ///
    /// Returns the first non-empty body, or the error of the last attempt.
    #[instrument(skip(self), fields(url = %self.status_url))]
    pub async fn query_status(&self) -> Result<Vec<u8>, AppmgrError> {
        let mut attempt = 1;
        loop {
            info!("getting xApp config from xApp manager (attempt {attempt}/{})", self.retries);

            let error = match self.query_status_once().await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            warn!("xApp status query failed: {error}");

            if attempt >= self.retries {
                return Err(error);
            }
            attempt += 1;
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn query_status_once(&self) -> Result<Vec<u8>, AppmgrError> {
        let url = &self.status_url;

        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| AppmgrError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(AppmgrError::Status {
                url: url.clone(),
                status: response.status(),
            });
        }

        let body = response.bytes().await.map_err(|source| AppmgrError::Body {
            url: url.clone(),
            source,
        })?;

        if body.is_empty() {
            return Err(AppmgrError::EmptyResponse { url: url.clone() });
        }

        debug!("received {} bytes of xApp status", body.len());
        Ok(body.to_vec())
    }

    /// Subscribe to xApp notifications, retrying with a fixed delay until accepted
    #[instrument(skip(self), fields(url = %self.subscription_url))]
    pub async fn subscribe_notifications(&self, target_url: &str) -> Result<String, AppmgrError> {
        loop {
            info!("subscribing xApp notifications for {target_url}");

            match self.try_subscribe(target_url).await {
                Ok(id) => {
                    info!("subscription done, id={id}");
                    return Ok(id);
                }
                Err(AppmgrError::Request { url, source }) if source.is_builder() => {
                    return Err(AppmgrError::Request { url, source });
                }
                Err(e) => warn!("subscription failed, retrying after short delay: {e}"),
            }

            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// One subscription attempt
    pub async fn try_subscribe(&self, target_url: &str) -> Result<String, AppmgrError> {
        let url = &self.subscription_url;
        let request = SubscriptionRequest {
            data: SubscriptionData {
                max_retries: self.notification_max_retries,
                retry_timer: self.notification_retry_timer,
                event_type: "all",
                target_url,
            },
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|source| AppmgrError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::CREATED {
            return Err(AppmgrError::Status {
                url: url.clone(),
                status: response.status(),
            });
        }

        let body = response.text().await.map_err(|source| AppmgrError::Body {
            url: url.clone(),
            source,
        })?;

        let parsed: SubscriptionResponse =
            serde_json::from_str(&body).map_err(|e| AppmgrError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(parsed.id)
    }
}

#[async_trait]
impl ModuleManager for AppmgrClient {
    async fn fetch_status(&self) -> Result<Vec<u8>, AppmgrError> {
        self.query_status().await
    }

    async fn subscribe(&self, target_url: &str) -> Result<String, AppmgrError> {
        self.subscribe_notifications(target_url).await
    }
}
