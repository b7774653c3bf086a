// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits for the remote speech services.

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AnalysisRequest, PronunciationAnalysis, Transcript};

/// Speech-to-text over a fetchable audio URL.
#[async_trait]
pub trait Transcriber: PluginAdapter {
    /// Transcribes the audio at `audio_url`. `language` of `None` lets the
    /// service detect it.
    async fn transcribe(
        &self,
        audio_url: &str,
        language: Option<&str>,
    ) -> Result<Transcript, ParlanceError>;
}

/// Phoneme-level pronunciation scoring against an expected phrase.
#[async_trait]
pub trait PronunciationAnalyzer: PluginAdapter {
    /// Returns the analysis, or an `ExternalService` error when the service
    /// reports failure or returns no analysis.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<PronunciationAnalysis, ParlanceError>;
}
