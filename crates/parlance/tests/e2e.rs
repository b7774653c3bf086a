// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the audio turn pipeline.
//!
//! Each test opens its own SQLite database in a temp directory and wires
//! intake, the worker pool, the ledger and the phoneme aggregator together,
//! with mock or wiremock-backed speech services.

use std::sync::Arc;
use std::time::Duration;

use parlance_config::model::{AnalysisConfig, BlobConfig, StorageConfig, TranscriptionConfig};
use parlance_core::types::{
    AlignmentKind, Message, PronunciationAnalysis, PronunciationStatus, ThreadId, UserId,
};
use parlance_core::{ParlanceError, UnitOfWork, work};
use parlance_ledger::{CostSchedule, CreditLedger};
use parlance_phonemes::PhonemeAggregator;
use parlance_speech::{FsBlobStore, MlAnalyzer, MlTranscriber};
use parlance_storage::SqliteStorage;
use parlance_test_utils::fixtures::{analysis_from, sample_analysis, thread_for};
use parlance_test_utils::{MockAnalyzer, MockBlobStore, MockTranscriber, Reply};
use parlance_worker::{
    AcceptedTurn, AudioSubmission, Intake, JobOutcome, PoolSettings, PronunciationWorker,
    SpeechServices, WorkerPool, WorkerSettings,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUDIO_COST: i64 = 5;

fn user() -> UserId {
    UserId("learner".into())
}

struct Pipeline {
    storage: Arc<SqliteStorage>,
    ledger: CreditLedger<SqliteStorage>,
    intake: Intake<SqliteStorage>,
    pool: WorkerPool,
    outcomes: broadcast::Receiver<JobOutcome>,
    _dir: TempDir,
}

struct PipelineBuilder {
    services: Option<SpeechServices>,
    balance: i64,
    concurrency: usize,
    job_deadline: Duration,
    shutdown_grace: Duration,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            services: None,
            balance: 10,
            concurrency: 2,
            job_deadline: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    fn balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }

    fn analyzer(self, analyzer: MockAnalyzer) -> Self {
        self.services(SpeechServices {
            blobs: Arc::new(MockBlobStore::new()),
            transcriber: Arc::new(MockTranscriber::new()),
            analyzer: Arc::new(analyzer),
        })
    }

    fn services(mut self, services: SpeechServices) -> Self {
        self.services = Some(services);
        self
    }

    fn job_deadline(mut self, deadline: Duration) -> Self {
        self.job_deadline = deadline;
        self
    }

    fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    async fn build(self) -> Pipeline {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            SqliteStorage::open(StorageConfig {
                database_path: dir.path().join("e2e.db").to_string_lossy().into_owned(),
                wal_mode: true,
            })
            .await
            .unwrap(),
        );
        let thread = thread_for(&user(), "thread-1");
        storage
            .transaction(work(move |scope| scope.insert_thread(&thread)))
            .await
            .unwrap();
        let ledger = CreditLedger::new(Arc::clone(&storage));
        ledger.initialize(&user(), self.balance).await.unwrap();

        let services = self.services.unwrap_or_else(|| SpeechServices {
            blobs: Arc::new(MockBlobStore::new()),
            transcriber: Arc::new(MockTranscriber::new()),
            analyzer: Arc::new(MockAnalyzer::new()),
        });
        let blobs = Arc::clone(&services.blobs);
        let worker = PronunciationWorker::new(
            Arc::clone(&storage),
            services,
            WorkerSettings::default(),
        );
        let pool = WorkerPool::start(
            worker,
            &PoolSettings {
                concurrency: self.concurrency,
                queue_capacity: 8,
                shutdown_grace: self.shutdown_grace,
            },
            CancellationToken::new(),
        );
        let outcomes = pool.subscribe();
        let intake = Intake::new(
            Arc::clone(&storage),
            blobs,
            pool.queue(),
            CostSchedule {
                text_turn_cost: 1,
                audio_turn_cost: AUDIO_COST,
            },
            self.job_deadline,
        );

        Pipeline {
            storage,
            ledger,
            intake,
            pool,
            outcomes,
            _dir: dir,
        }
    }
}

async fn submit_to(
    intake: &Intake<SqliteStorage>,
    expected: Option<&str>,
) -> Result<AcceptedTurn, ParlanceError> {
    intake
        .submit_audio_turn(AudioSubmission {
            user_id: user(),
            thread_id: ThreadId("thread-1".into()),
            audio: b"RIFF-fake-wav".to_vec(),
            content_type: "audio/wav".into(),
            expected_text: expected.map(str::to_string),
        })
        .await
}

impl Pipeline {
    async fn submit(&self, expected: Option<&str>) -> Result<AcceptedTurn, ParlanceError> {
        submit_to(&self.intake, expected).await
    }

    async fn next_outcome(&mut self) -> JobOutcome {
        tokio::time::timeout(Duration::from_secs(10), self.outcomes.recv())
            .await
            .expect("no job outcome within 10s")
            .unwrap()
    }

    async fn message(&self, accepted: &AcceptedTurn) -> Message {
        let id = accepted.message.id.clone();
        self.storage
            .ambient(work(move |scope| scope.get_message(&id)))
            .await
            .unwrap()
            .unwrap()
    }

    async fn thread_messages(&self) -> Vec<Message> {
        self.storage
            .ambient(work(|scope| {
                scope.messages_for_thread(&ThreadId("thread-1".into()))
            }))
            .await
            .unwrap()
    }
}

// ---- Scenario A: successful audio turn ----

#[tokio::test]
async fn audio_turn_is_charged_analyzed_and_recorded() {
    let mut p = PipelineBuilder::new().build().await;

    let accepted = p.submit(Some("think")).await.unwrap();
    assert_eq!(accepted.message.pronunciation_status, PronunciationStatus::Pending);
    assert_eq!(accepted.charge.as_ref().unwrap().balance_after, 5);

    let outcome = p.next_outcome().await;
    assert!(matches!(outcome, JobOutcome::Completed { .. }), "got {outcome:?}");

    let message = p.message(&accepted).await;
    assert_eq!(message.pronunciation_status, PronunciationStatus::Complete);
    assert_eq!(message.content, "think");
    assert!(message.pronunciation_error.is_none());
    let stored: PronunciationAnalysis =
        serde_json::from_value(message.pronunciation_result.unwrap()).unwrap();
    assert_eq!(stored, sample_analysis());

    let report = PhonemeAggregator::new(Arc::clone(&p.storage))
        .user_report(&user())
        .await
        .unwrap();
    assert_eq!(report.total_attempts, 4);
    assert_eq!(report.total_correct, 2);
    assert_eq!(report.top_substitutions.len(), 1);
    assert_eq!(report.top_substitutions[0].expected_phoneme, "ɪ");

    assert_eq!(p.ledger.verify_balance(&user()).await.unwrap(), 5);
    p.pool.shutdown().await;
}

// ---- Scenario B: analysis exceeds the job deadline ----

#[tokio::test]
async fn timed_out_analysis_fails_and_keeps_the_charge() {
    let mut p = PipelineBuilder::new()
        .analyzer(MockAnalyzer::new().with_delay(Duration::from_secs(30)))
        .job_deadline(Duration::from_millis(200))
        .build()
        .await;

    let accepted = p.submit(Some("think")).await.unwrap();
    match p.next_outcome().await {
        JobOutcome::Failed { reason, .. } => assert!(reason.starts_with("TIMEOUT"), "got {reason}"),
        other => panic!("expected failure, got {other:?}"),
    }

    let message = p.message(&accepted).await;
    assert_eq!(message.pronunciation_status, PronunciationStatus::Failed);
    assert!(!message.pronunciation_error.unwrap_or_default().is_empty());
    assert!(message.pronunciation_result.is_none());

    assert_eq!(p.ledger.verify_balance(&user()).await.unwrap(), 5);
    let report = PhonemeAggregator::new(Arc::clone(&p.storage))
        .user_report(&user())
        .await
        .unwrap();
    assert_eq!(report.total_attempts, 0);
    p.pool.shutdown().await;
}

// ---- Scenario C: not enough credits ----

#[tokio::test]
async fn insufficient_credits_create_no_message() {
    let p = PipelineBuilder::new().balance(2).build().await;

    let err = p.submit(Some("think")).await.unwrap_err();
    assert!(matches!(
        err,
        ParlanceError::InsufficientCredits {
            required: AUDIO_COST,
            available: 2,
            ..
        }
    ));
    assert!(p.thread_messages().await.is_empty());
    assert_eq!(p.ledger.verify_balance(&user()).await.unwrap(), 2);
    assert_eq!(p.ledger.history(&user(), 10).await.unwrap().len(), 1);
    p.pool.shutdown().await;
}

// ---- Scenario D: concurrent analyses of the same phoneme ----

#[tokio::test]
async fn concurrent_analyses_both_count() {
    let analyzer = MockAnalyzer::with_replies(vec![
        Reply::Ok(analysis_from(&[("θ", "θ", AlignmentKind::Match)])),
        Reply::Ok(analysis_from(&[("θ", "f", AlignmentKind::Substitute)])),
    ]);
    let mut p = PipelineBuilder::new().analyzer(analyzer).build().await;

    let first = p.submit(Some("th")).await.unwrap();
    let second = p.submit(Some("th")).await.unwrap();
    for _ in 0..2 {
        assert!(matches!(p.next_outcome().await, JobOutcome::Completed { .. }));
    }

    assert_eq!(p.message(&first).await.pronunciation_status, PronunciationStatus::Complete);
    assert_eq!(p.message(&second).await.pronunciation_status, PronunciationStatus::Complete);

    let report = PhonemeAggregator::new(Arc::clone(&p.storage))
        .user_report(&user())
        .await
        .unwrap();
    let theta = report.phonemes.iter().find(|s| s.phoneme == "θ").unwrap();
    assert_eq!(theta.total_attempts, 2);
    assert_eq!(theta.correct_count, 1);
    assert_eq!(report.top_substitutions[0].occurrence_count, 1);
    assert_eq!(p.ledger.verify_balance(&user()).await.unwrap(), 0);
    p.pool.shutdown().await;
}

// ---- Failure reporting ----

#[tokio::test]
async fn service_error_code_is_recorded() {
    let analyzer = MockAnalyzer::with_replies(vec![Reply::fail(
        "AUDIO_DOWNLOAD_FAILED",
        "HTTP 403",
    )]);
    let mut p = PipelineBuilder::new().analyzer(analyzer).build().await;

    let accepted = p.submit(Some("think")).await.unwrap();
    assert!(matches!(p.next_outcome().await, JobOutcome::Failed { .. }));

    let message = p.message(&accepted).await;
    assert_eq!(message.pronunciation_status, PronunciationStatus::Failed);
    assert_eq!(
        message.pronunciation_error.as_deref(),
        Some("AUDIO_DOWNLOAD_FAILED: HTTP 403")
    );
    assert_eq!(p.ledger.balance(&user()).await.unwrap(), 5);
    p.pool.shutdown().await;
}

#[tokio::test]
async fn interrupted_jobs_stay_pending() {
    let p = PipelineBuilder::new()
        .analyzer(MockAnalyzer::new().with_delay(Duration::from_secs(30)))
        .shutdown_grace(Duration::from_millis(100))
        .build()
        .await;

    let accepted = p.submit(Some("think")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = p.pool.shutdown().await;
    assert!(!report.drained);

    let id = accepted.message.id.clone();
    let message = p
        .storage
        .ambient(work(move |scope| scope.get_message(&id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.pronunciation_status, PronunciationStatus::Pending);
    assert_eq!(p.ledger.balance(&user()).await.unwrap(), 5);
}

#[tokio::test]
async fn turn_after_shutdown_is_accepted_but_not_queued() {
    let p = PipelineBuilder::new().build().await;
    p.pool.shutdown().await;

    let accepted = submit_to(&p.intake, Some("think")).await.unwrap();
    assert!(!accepted.queued);
    assert_eq!(p.ledger.balance(&user()).await.unwrap(), 5);

    let id = accepted.message.id.clone();
    let message = p
        .storage
        .ambient(work(move |scope| scope.get_message(&id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.pronunciation_status, PronunciationStatus::Pending);
}

// ---- Real HTTP clients and blob store ----

async fn http_services(server: &MockServer, dir: &TempDir) -> SpeechServices {
    let blobs = FsBlobStore::new(&BlobConfig {
        root_dir: dir.path().join("audio").to_string_lossy().into_owned(),
        public_base_url: "https://audio.example.com".into(),
        signing_key: Some("e2e-signing-key-0123456789abcdef".into()),
        presign_ttl_secs: 600,
    });
    let transcriber = MlTranscriber::new(&TranscriptionConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        max_retries: 0,
        language: Some("en".into()),
    })
    .unwrap();
    let analyzer = MlAnalyzer::new(&AnalysisConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        max_retries: 0,
        language: "en-us".into(),
    })
    .unwrap();
    SpeechServices {
        blobs: Arc::new(blobs),
        transcriber: Arc::new(transcriber),
        analyzer: Arc::new(analyzer),
    }
}

#[tokio::test]
async fn pipeline_runs_against_http_services() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transcribe"))
        .and(body_partial_json(json!({"language": "en"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "text": " think ",
            "language": "en",
            "duration": 1.1,
            "words": [{"word": "think", "start": 0.1, "end": 0.9}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyze-pronunciation"))
        .and(body_partial_json(json!({"expected_text": "think", "language": "en-us"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "analysis": serde_json::to_value(sample_analysis()).unwrap()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let blob_dir = tempfile::tempdir().unwrap();
    let mut p = PipelineBuilder::new()
        .services(http_services(&server, &blob_dir).await)
        .build()
        .await;

    // No expected phrase: the transcript is scored against itself.
    let accepted = p.submit(None).await.unwrap();
    let audio_ref = accepted.message.audio_ref.clone().unwrap();
    assert!(audio_ref.starts_with("user/thread-1/"));
    assert!(audio_ref.ends_with(".wav"));
    assert!(blob_dir.path().join("audio").join(&audio_ref).exists());

    assert!(matches!(p.next_outcome().await, JobOutcome::Completed { .. }));
    let message = p.message(&accepted).await;
    assert_eq!(message.pronunciation_status, PronunciationStatus::Complete);
    assert_eq!(message.content, "think");
    assert_eq!(message.audio_duration_secs, Some(1.1));
    p.pool.shutdown().await;
}

#[tokio::test]
async fn http_service_error_fails_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "text": "think"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyze-pronunciation"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "status": "error",
            "error": {"code": "INVALID_AUDIO", "message": "not audio", "retryable": false}
        })))
        .mount(&server)
        .await;

    let blob_dir = tempfile::tempdir().unwrap();
    let services = http_services(&server, &blob_dir).await;
    let blobs = Arc::clone(&services.blobs);
    let mut p = PipelineBuilder::new().services(services).build().await;

    let accepted = p.submit(Some("think")).await.unwrap();
    assert!(matches!(p.next_outcome().await, JobOutcome::Failed { .. }));

    let message = p.message(&accepted).await;
    assert_eq!(message.pronunciation_status, PronunciationStatus::Failed);
    assert_eq!(message.pronunciation_error.as_deref(), Some("INVALID_AUDIO: not audio"));
    // The audio is kept for the failed message.
    let audio_ref = message.audio_ref.unwrap();
    let blob = blobs.get(&audio_ref).await.unwrap();
    assert_eq!(blob.bytes, b"RIFF-fake-wav");
    assert_eq!(blob.content_type, "audio/wav");
    assert_eq!(p.ledger.balance(&user()).await.unwrap(), 5);
    p.pool.shutdown().await;
}
