//! reqwest-backed [`HttpTransport`].
//!
//! Connection failures are retried with exponential backoff (200ms, 400ms,
//! 800ms). Any other failure, including timeouts, is returned immediately:
//! the request may already have reached the vendor, and create-invoice calls
//! are not idempotent.

use crate::domain::ports::HttpTransport;
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries.
const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, TransportError> {
        let endpoint = format!("POST {}", url.path());

        let resp = retry_send(|| self.http.post(url.clone()).json(body).send())
            .await
            .map_err(|e| TransportError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| TransportError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        tracing::debug!(%endpoint, status = status.as_u16(), "vendor responded");

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(e) if status.is_success() => Err(TransportError::Decode {
                endpoint,
                reason: e.to_string(),
            }),
            Err(_) => Err(TransportError::Status {
                endpoint,
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

/// Sends a request, retrying only when the connection could not be established.
pub(crate) async fn retry_send<F, Fut>(f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_connect() => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "vendor connection failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    f().await
}
