// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pronunciation analysis client.

use std::time::Duration;

use async_trait::async_trait;
use parlance_config::model::AnalysisConfig;
use parlance_core::types::{AdapterType, AnalysisRequest, HealthStatus, PronunciationAnalysis};
use parlance_core::{ParlanceError, PluginAdapter, PronunciationAnalyzer, ServiceKind};
use tracing::debug;

use crate::client::SpeechClient;
use crate::types::AnalyzeResponse;

const ANALYZE_PATH: &str = "/api/v1/analyze-pronunciation";

/// [`PronunciationAnalyzer`] backed by `/api/v1/analyze-pronunciation`.
pub struct MlAnalyzer {
    client: SpeechClient,
}

impl MlAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ParlanceError> {
        let client = SpeechClient::new(
            ServiceKind::Analysis,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: SpeechClient) -> Self {
        Self { client }
    }
}

/// Unwraps the response envelope. `status = error` and a missing analysis
/// both become `ExternalService` errors.
fn into_analysis(response: AnalyzeResponse) -> Result<PronunciationAnalysis, ParlanceError> {
    if response.status == "error" {
        return Err(match response.error {
            Some(err) => ParlanceError::ExternalService {
                service: ServiceKind::Analysis,
                code: err.code,
                message: err.message,
                retryable: err.retryable,
                source: None,
            },
            None => ParlanceError::external(ServiceKind::Analysis, "UNKNOWN", "Unknown error"),
        });
    }
    response.analysis.ok_or_else(|| {
        ParlanceError::external(
            ServiceKind::Analysis,
            "NO_ANALYSIS",
            "ML service returned success but no analysis data",
        )
    })
}

#[async_trait]
impl PluginAdapter for MlAnalyzer {
    fn name(&self) -> &str {
        "ml-analysis"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Analysis
    }

    async fn health_check(&self) -> Result<HealthStatus, ParlanceError> {
        Ok(self.client.health().await)
    }

    async fn shutdown(&self) -> Result<(), ParlanceError> {
        Ok(())
    }
}

#[async_trait]
impl PronunciationAnalyzer for MlAnalyzer {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<PronunciationAnalysis, ParlanceError> {
        let response: AnalyzeResponse = self.client.post_json(ANALYZE_PATH, request).await?;
        let analysis = into_analysis(response)?;
        debug!(
            matched = analysis.match_count,
            phonemes = analysis.phoneme_count,
            processing_ms = analysis.processing_time_ms,
            "pronunciation analysis complete"
        );
        Ok(analysis)
    }
}
