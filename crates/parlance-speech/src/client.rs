// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client shared by the speech service adapters.
//!
//! Provides [`SpeechClient`], which handles JSON request construction,
//! connection pooling, and retry of transient HTTP statuses.

use std::time::Duration;

use parlance_core::types::HealthStatus;
use parlance_core::{ParlanceError, ServiceKind};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{ErrorEnvelope, HealthResponse};

/// JSON-over-HTTP client for one speech service.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    service: ServiceKind,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl SpeechClient {
    /// Creates a client for `service` rooted at `base_url`.
    ///
    /// `timeout` bounds each HTTP attempt; `max_retries` counts extra
    /// attempts after a transient status.
    pub fn new(
        service: ServiceKind,
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ParlanceError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParlanceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the pause between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Code used when the service itself gives none.
    pub fn error_code(&self) -> &'static str {
        match self.service {
            ServiceKind::Transcription => "TRANSCRIPTION_ERROR",
            ServiceKind::Analysis => "ML_SERVICE_ERROR",
            ServiceKind::BlobStore => "BLOB_STORE_ERROR",
        }
    }

    fn failure(
        &self,
        message: String,
        retryable: bool,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> ParlanceError {
        ParlanceError::ExternalService {
            service: self.service,
            code: self.error_code().to_string(),
            message,
            retryable,
            source,
        }
    }

    /// POSTs `body` to `{base_url}{path}` and decodes a JSON response.
    ///
    /// On transient statuses (429, 500, 502, 503), retries up to
    /// `max_retries` times after `retry_delay`.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ParlanceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(service = %self.service, attempt, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    let message = if e.is_timeout() {
                        format!("request to {path} timed out")
                    } else {
                        format!("HTTP request failed: {e}")
                    };
                    return Err(self.failure(message, true, Some(Box::new(e))));
                }
            };

            let status = response.status();
            debug!(service = %self.service, status = %status, attempt, "response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| {
                    self.failure(
                        format!("failed to read response body: {e}"),
                        true,
                        Some(Box::new(e)),
                    )
                })?;
                return serde_json::from_str(&text).map_err(|e| {
                    self.failure(
                        format!("failed to parse service response: {e}"),
                        false,
                        Some(Box::new(e)),
                    )
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(service = %self.service, status = %status, body = %body, "transient error, will retry");
                last_error = Some(self.failure(format!("service returned {status}"), true, None));
                continue;
            }

            // Non-transient error or exhausted retries.
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => ParlanceError::ExternalService {
                    service: self.service,
                    code: envelope.error.code,
                    message: envelope.error.message,
                    retryable: envelope.error.retryable,
                    source: None,
                },
                Err(_) => self.failure(
                    format!("service returned status {}", status.as_u16()),
                    is_transient_error(status),
                    None,
                ),
            });
        }

        Err(last_error
            .unwrap_or_else(|| self.failure("request failed after retries".into(), true, None)))
    }

    /// Checks `GET {base_url}/health`. Never fails; problems are reported
    /// in the returned status.
    pub async fn health(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return HealthStatus::Unhealthy(format!("unreachable: {e}")),
        };
        if !response.status().is_success() {
            return HealthStatus::Unhealthy(format!("health returned {}", response.status()));
        }
        match response.json::<HealthResponse>().await {
            Ok(body) if body.status == "healthy" => HealthStatus::Healthy,
            Ok(body) => HealthStatus::Degraded(body.status),
            Err(e) => HealthStatus::Degraded(format!("unreadable health body: {e}")),
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
