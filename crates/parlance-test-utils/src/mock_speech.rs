// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock blob store, transcriber and analyzer for deterministic testing.
//!
//! Each mock pops scripted replies from a FIFO queue and falls back to a
//! fixed default when the queue is empty. Requests are recorded so tests can
//! assert on what the pipeline sent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parlance_core::types::{
    AdapterType, AnalysisRequest, HealthStatus, PronunciationAnalysis, StoredBlob, Transcript,
};
use parlance_core::{
    BlobStore, ParlanceError, PluginAdapter, PronunciationAnalyzer, ServiceKind, Transcriber,
};

use crate::fixtures::sample_analysis;

/// A scripted reply. Errors are stored as parts because `ParlanceError`
/// is not `Clone`.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail { code: String, message: String },
}

impl<T> Reply<T> {
    pub fn fail(code: &str, message: &str) -> Self {
        Self::Fail {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    fn into_result(self, service: ServiceKind) -> Result<T, ParlanceError> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Fail { code, message } => {
                Err(ParlanceError::external(service, code, message))
            }
        }
    }
}

macro_rules! plugin_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, ParlanceError> {
                Ok(HealthStatus::Healthy)
            }

            async fn shutdown(&self) -> Result<(), ParlanceError> {
                Ok(())
            }
        }
    };
}

// --- Blob store ---

/// In-memory blob store. References are `mem://<key_hint>`.
#[derive(Default)]
pub struct MockBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_put: Mutex<bool>,
    fail_presign: Mutex<bool>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes later `put` calls fail.
    pub async fn fail_puts(&self) {
        *self.fail_put.lock().await = true;
    }

    /// Makes later `presigned_url` calls fail.
    pub async fn fail_presigns(&self) {
        *self.fail_presign.lock().await = true;
    }

    /// Content type a reference was stored with.
    pub async fn content_type(&self, reference: &str) -> Option<String> {
        self.blobs.lock().await.get(reference).map(|(_, ct)| ct.clone())
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

plugin_adapter!(MockBlobStore, "mock-blob", AdapterType::BlobStore);

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        key_hint: &str,
    ) -> Result<String, ParlanceError> {
        if *self.fail_put.lock().await {
            return Err(ParlanceError::external(
                ServiceKind::BlobStore,
                "BLOB_PUT_ERROR",
                "mock put failure",
            ));
        }
        let reference = format!("mem://{key_hint}");
        self.blobs
            .lock()
            .await
            .insert(reference.clone(), (bytes, content_type.to_string()));
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> Result<StoredBlob, ParlanceError> {
        self.blobs
            .lock()
            .await
            .get(reference)
            .map(|(bytes, content_type)| StoredBlob {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
            })
            .ok_or_else(|| ParlanceError::not_found("blob", reference))
    }

    async fn presigned_url(
        &self,
        reference: &str,
        ttl: Duration,
    ) -> Result<String, ParlanceError> {
        if *self.fail_presign.lock().await {
            return Err(ParlanceError::external(
                ServiceKind::BlobStore,
                "PRESIGNED_URL_ERROR",
                "mock presign failure",
            ));
        }
        if !self.blobs.lock().await.contains_key(reference) {
            return Err(ParlanceError::not_found("blob", reference));
        }
        let key = reference.trim_start_matches("mem://");
        Ok(format!("https://blobs.test/{key}?ttl={}", ttl.as_secs()))
    }

    async fn delete(&self, reference: &str) -> Result<(), ParlanceError> {
        self.blobs.lock().await.remove(reference);
        Ok(())
    }
}

// --- Transcriber ---

/// Mock speech-to-text. Default reply is the transcript `"think"`.
pub struct MockTranscriber {
    replies: Arc<Mutex<VecDeque<Reply<Transcript>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<Reply<Transcript>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Audio URLs received, in order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

plugin_adapter!(MockTranscriber, "mock-transcriber", AdapterType::Transcription);

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        audio_url: &str,
        _language: Option<&str>,
    ) -> Result<Transcript, ParlanceError> {
        self.requests.lock().await.push(audio_url.to_string());
        let reply = self.replies.lock().await.pop_front().unwrap_or_else(|| {
            Reply::Ok(Transcript {
                text: "think".to_string(),
                language: Some("en".to_string()),
                duration_secs: Some(1.2),
                words: Vec::new(),
            })
        });
        reply.into_result(ServiceKind::Transcription)
    }
}

// --- Analyzer ---

/// Mock pronunciation analyzer. Default reply is [`sample_analysis`].
pub struct MockAnalyzer {
    replies: Arc<Mutex<VecDeque<Reply<PronunciationAnalysis>>>>,
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
    delay: Option<Duration>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<Reply<PronunciationAnalysis>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleeps for `delay` before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

plugin_adapter!(MockAnalyzer, "mock-analyzer", AdapterType::Analysis);

#[async_trait]
impl PronunciationAnalyzer for MockAnalyzer {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<PronunciationAnalysis, ParlanceError> {
        self.requests.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(sample_analysis()));
        reply.into_result(ServiceKind::Analysis)
    }
}
