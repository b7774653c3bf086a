// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives one audio message from `pending` to a terminal state.
//!
//! A job presigns the stored audio, transcribes it and scores it against the
//! expected phrase, all under the job's deadline. Success writes the result
//! and the phoneme statistics in one transaction. Any external failure,
//! including the deadline, marks the message `failed` with a
//! `"<CODE>: <message>"` reason and records no statistics. The charge taken
//! at intake is never touched here.

use std::sync::Arc;
use std::time::Duration;

use parlance_config::ParlanceConfig;
use parlance_core::types::{
    AnalysisRequest, MessageId, PronunciationAnalysis, PronunciationStatus, Transcript, UserId,
    now_timestamp,
};
use parlance_core::{
    BlobStore, MessageRepo, ParlanceError, PronunciationAnalyzer, PronunciationCompletion,
    ServiceKind, Transcriber, UnitOfWork, work,
};
use parlance_phonemes::{Tally, record_in};
use tracing::{debug, error, info, warn};

/// One queued analysis.
#[derive(Debug, Clone)]
pub struct PronunciationJob {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub audio_ref: String,
    /// Phrase the user meant to say; the transcript is used when absent.
    pub expected_text: Option<String>,
    pub deadline: Duration,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        message_id: MessageId,
        phonemes: usize,
    },
    Failed {
        message_id: MessageId,
        reason: String,
    },
    /// Storage rejected the final write; the message keeps whatever state
    /// storage last committed.
    Aborted {
        message_id: MessageId,
        error: String,
    },
}

impl JobOutcome {
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Completed { message_id, .. }
            | Self::Failed { message_id, .. }
            | Self::Aborted { message_id, .. } => message_id,
        }
    }
}

/// External collaborators a worker calls.
#[derive(Clone)]
pub struct SpeechServices {
    pub blobs: Arc<dyn BlobStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub analyzer: Arc<dyn PronunciationAnalyzer>,
}

/// Worker knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub presign_ttl: Duration,
    pub job_deadline: Duration,
    pub analysis_language: String,
    pub transcription_language: Option<String>,
}

impl WorkerSettings {
    pub fn from_config(config: &ParlanceConfig) -> Self {
        Self {
            presign_ttl: config.blob.presign_ttl(),
            job_deadline: config.worker.job_deadline(),
            analysis_language: config.analysis.language.clone(),
            transcription_language: config.transcription.language.clone(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&ParlanceConfig::default())
    }
}

/// Builds the error for a guarded transition that matched no row, reporting
/// the state the row is actually in.
pub(crate) fn transition_error<S: MessageRepo + ?Sized>(
    scope: &S,
    id: &MessageId,
    to: PronunciationStatus,
) -> ParlanceError {
    match scope.get_message(id) {
        Ok(Some(message)) => ParlanceError::InvalidTransition {
            message_id: id.to_string(),
            from: message.pronunciation_status,
            to,
        },
        Ok(None) => ParlanceError::not_found("message", id.as_str()),
        Err(e) => e,
    }
}

/// Runs pronunciation jobs against one store and one set of services.
pub struct PronunciationWorker<U> {
    store: Arc<U>,
    services: SpeechServices,
    settings: WorkerSettings,
}

impl<U> Clone for PronunciationWorker<U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            services: self.services.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<U: UnitOfWork> PronunciationWorker<U> {
    pub fn new(store: Arc<U>, services: SpeechServices, settings: WorkerSettings) -> Self {
        Self {
            store,
            services,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Processes one job to a terminal state. Never returns an error;
    /// storage problems are reported as [`JobOutcome::Aborted`].
    pub async fn process(&self, job: PronunciationJob) -> JobOutcome {
        debug!(message_id = %job.message_id, "starting pronunciation analysis");

        let analyzed = tokio::time::timeout(job.deadline, self.analyze(&job))
            .await
            .unwrap_or(Err(ParlanceError::Timeout {
                duration: job.deadline,
            }));

        match analyzed {
            Ok((transcript, analysis)) => self.complete(&job, transcript, analysis).await,
            Err(e) => {
                warn!(message_id = %job.message_id, error = %e, "pronunciation analysis failed");
                self.fail(&job, &e).await
            }
        }
    }

    async fn analyze(
        &self,
        job: &PronunciationJob,
    ) -> Result<(Transcript, PronunciationAnalysis), ParlanceError> {
        let audio_url = self
            .services
            .blobs
            .presigned_url(&job.audio_ref, self.settings.presign_ttl)
            .await
            .map_err(presign_failure)?;

        let transcript = self
            .services
            .transcriber
            .transcribe(&audio_url, self.settings.transcription_language.as_deref())
            .await?;

        let expected_text = match job.expected_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => transcript.text.clone(),
        };
        if expected_text.is_empty() {
            return Err(ParlanceError::external(
                ServiceKind::Transcription,
                "EMPTY_TRANSCRIPT",
                "no speech detected and no expected phrase given",
            ));
        }

        let request = AnalysisRequest {
            audio_url,
            expected_text,
            language: self.settings.analysis_language.clone(),
        };
        let analysis = self.services.analyzer.analyze(&request).await?;
        Ok((transcript, analysis))
    }

    async fn complete(
        &self,
        job: &PronunciationJob,
        transcript: Transcript,
        analysis: PronunciationAnalysis,
    ) -> JobOutcome {
        let result = match serde_json::to_value(&analysis) {
            Ok(value) => value,
            Err(e) => {
                let err = ParlanceError::Internal(format!("failed to encode analysis: {e}"));
                return self.fail(job, &err).await;
            }
        };
        let tally = Tally::from_analysis(&analysis);
        let phonemes = tally.phonemes.len();
        let completion = PronunciationCompletion {
            transcript: transcript.text,
            result,
            audio_duration_secs: transcript.duration_secs,
            completed_at: now_timestamp(),
        };

        let message_id = job.message_id.clone();
        let user_id = job.user_id.clone();
        let written = self
            .store
            .transaction(work(move |scope| {
                if !scope.complete_pronunciation(&message_id, &completion)? {
                    return Err(transition_error(
                        scope,
                        &message_id,
                        PronunciationStatus::Complete,
                    ));
                }
                record_in(scope, &user_id, &tally, &completion.completed_at)
            }))
            .await;

        match written {
            Ok(()) => {
                info!(
                    message_id = %job.message_id,
                    user_id = %job.user_id,
                    matched = analysis.match_count,
                    phonemes = analysis.phoneme_count,
                    "pronunciation analysis complete"
                );
                JobOutcome::Completed {
                    message_id: job.message_id.clone(),
                    phonemes,
                }
            }
            Err(e) => {
                error!(message_id = %job.message_id, error = %e, "failed to store pronunciation result");
                JobOutcome::Aborted {
                    message_id: job.message_id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn fail(&self, job: &PronunciationJob, cause: &ParlanceError) -> JobOutcome {
        let reason = cause.failure_reason();
        let message_id = job.message_id.clone();
        let stored_reason = reason.clone();
        let written = self
            .store
            .transaction(work(move |scope| {
                if !scope.fail_pronunciation(&message_id, &stored_reason, &now_timestamp())? {
                    return Err(transition_error(
                        scope,
                        &message_id,
                        PronunciationStatus::Failed,
                    ));
                }
                Ok(())
            }))
            .await;

        match written {
            Ok(()) => JobOutcome::Failed {
                message_id: job.message_id.clone(),
                reason,
            },
            Err(e) => {
                error!(message_id = %job.message_id, error = %e, "failed to record pronunciation failure");
                JobOutcome::Aborted {
                    message_id: job.message_id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Blob errors that are not already external-service errors still fail the
/// job under the presign code.
fn presign_failure(e: ParlanceError) -> ParlanceError {
    match e {
        external @ ParlanceError::ExternalService { .. } => external,
        other => ParlanceError::ExternalService {
            service: ServiceKind::BlobStore,
            code: "PRESIGNED_URL_ERROR".into(),
            message: other.to_string(),
            retryable: false,
            source: Some(Box::new(other)),
        },
    }
}
