// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the speech service HTTP API.

use parlance_core::types::{PronunciationAnalysis, WordTiming};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/transcribe`.
#[derive(Debug, Clone, Serialize)]
pub struct TranscribeRequest<'a> {
    pub audio_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
}

/// Error object embedded in service responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

/// Response of `POST /api/v1/transcribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResponse {
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub words: Option<Vec<WordTiming>>,
    #[serde(default)]
    pub error: Option<ServiceErrorBody>,
}

/// Response of `POST /api/v1/analyze-pronunciation`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    #[serde(default)]
    pub analysis: Option<PronunciationAnalysis>,
    #[serde(default)]
    pub error: Option<ServiceErrorBody>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Any response that may carry an error object, used to enrich non-2xx
/// failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ServiceErrorBody,
}
