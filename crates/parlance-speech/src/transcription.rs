// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech-to-text client.

use std::time::Duration;

use async_trait::async_trait;
use parlance_config::model::TranscriptionConfig;
use parlance_core::types::{AdapterType, HealthStatus, Transcript};
use parlance_core::{ParlanceError, PluginAdapter, ServiceKind, Transcriber};
use tracing::debug;

use crate::client::SpeechClient;
use crate::types::{TranscribeRequest, TranscribeResponse};

const TRANSCRIBE_PATH: &str = "/api/v1/transcribe";

/// [`Transcriber`] backed by the speech service's `/api/v1/transcribe` endpoint.
pub struct MlTranscriber {
    client: SpeechClient,
    default_language: Option<String>,
}

impl MlTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, ParlanceError> {
        let client = SpeechClient::new(
            ServiceKind::Transcription,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self::with_client(client, config.language.clone()))
    }

    pub fn with_client(client: SpeechClient, default_language: Option<String>) -> Self {
        Self {
            client,
            default_language,
        }
    }
}

fn into_transcript(response: TranscribeResponse) -> Result<Transcript, ParlanceError> {
    if response.status == "error" {
        return Err(match response.error {
            Some(err) => ParlanceError::ExternalService {
                service: ServiceKind::Transcription,
                code: err.code,
                message: err.message,
                retryable: err.retryable,
                source: None,
            },
            None => ParlanceError::external(
                ServiceKind::Transcription,
                "UNKNOWN",
                "transcription failed without details",
            ),
        });
    }
    let text = response.text.ok_or_else(|| {
        ParlanceError::external(
            ServiceKind::Transcription,
            "NO_TRANSCRIPT",
            "transcription returned success but no text",
        )
    })?;
    Ok(Transcript {
        text: text.trim().to_string(),
        language: response.language,
        duration_secs: response.duration,
        words: response.words.unwrap_or_default(),
    })
}

#[async_trait]
impl PluginAdapter for MlTranscriber {
    fn name(&self) -> &str {
        "ml-transcription"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, ParlanceError> {
        Ok(self.client.health().await)
    }

    async fn shutdown(&self) -> Result<(), ParlanceError> {
        Ok(())
    }
}

#[async_trait]
impl Transcriber for MlTranscriber {
    async fn transcribe(
        &self,
        audio_url: &str,
        language: Option<&str>,
    ) -> Result<Transcript, ParlanceError> {
        let request = TranscribeRequest {
            audio_url,
            language: language.or(self.default_language.as_deref()),
        };
        let response: TranscribeResponse = self.client.post_json(TRANSCRIBE_PATH, &request).await?;
        let transcript = into_transcript(response)?;
        debug!(
            chars = transcript.text.len(),
            language = transcript.language.as_deref().unwrap_or("unknown"),
            "transcription complete"
        );
        Ok(transcript)
    }
}
