// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accepts user turns: charges credits, persists the message and, for audio,
//! queues the pronunciation job.
//!
//! An audio turn is charged before any speech service is called. The debit,
//! the message row and its `none → pending` transition commit together, so a
//! rejected charge leaves no message behind and an accepted one always has a
//! `pending` row before the job is queued. Once that commit succeeds the
//! turn is accepted even if the queue refuses the job; the row stays
//! `pending` for the reconciliation sweep.

use std::sync::Arc;
use std::time::Duration;

use parlance_core::types::{
    CreditTransaction, Message, MessageId, PronunciationStatus, Role, ThreadId, UserId,
    now_timestamp,
};
use parlance_core::{BlobStore, CreditRepo, ParlanceError, UnitOfWork, work};
use parlance_ledger::{CostSchedule, CreditLedger, TurnKind, debit};
use tracing::{info, warn};

use crate::pool::JobQueue;
use crate::worker::{PronunciationJob, transition_error};

/// A recorded audio turn.
#[derive(Debug, Clone)]
pub struct AudioSubmission {
    pub user_id: UserId,
    pub thread_id: ThreadId,
    pub audio: Vec<u8>,
    pub content_type: String,
    /// Target phrase for the analysis; the transcript is used when absent.
    pub expected_text: Option<String>,
}

/// What the caller gets back immediately.
#[derive(Debug, Clone)]
pub struct AcceptedTurn {
    pub message: Message,
    /// `None` when the turn is free.
    pub charge: Option<CreditTransaction>,
    /// Whether an analysis job was handed to the worker pool.
    pub queued: bool,
}

/// Debits `cost` for a turn; free turns write nothing.
fn charge_turn<S: CreditRepo + ?Sized>(
    scope: &mut S,
    user_id: &UserId,
    cost: i64,
    reason: &str,
    message_id: &MessageId,
) -> Result<Option<CreditTransaction>, ParlanceError> {
    if cost == 0 {
        return Ok(None);
    }
    debit(scope, user_id, cost, reason, Some(message_id.as_str())).map(Some)
}

/// Entry point for new user turns.
pub struct Intake<U> {
    store: Arc<U>,
    ledger: CreditLedger<U>,
    blobs: Arc<dyn BlobStore>,
    queue: JobQueue,
    costs: CostSchedule,
    job_deadline: Duration,
}

impl<U: UnitOfWork> Intake<U> {
    pub fn new(
        store: Arc<U>,
        blobs: Arc<dyn BlobStore>,
        queue: JobQueue,
        costs: CostSchedule,
        job_deadline: Duration,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(Arc::clone(&store)),
            store,
            blobs,
            queue,
            costs,
            job_deadline,
        }
    }

    /// Fails with `NotFound` unless `thread_id` exists and belongs to `user_id`.
    async fn verify_owner(&self, user_id: &UserId, thread_id: &ThreadId) -> Result<(), ParlanceError> {
        let id = thread_id.clone();
        let thread = self
            .store
            .ambient(work(move |scope| scope.get_thread(&id)))
            .await?;
        match thread {
            Some(thread) if &thread.user_id == user_id => Ok(()),
            _ => Err(ParlanceError::not_found("thread", thread_id.as_str())),
        }
    }

    /// Charges an audio turn, stores the audio, persists the `pending`
    /// message and queues its analysis.
    ///
    /// `InsufficientCredits` leaves no message row and no stored audio. A
    /// queue that refuses the job does not fail the turn: the result has
    /// `queued == false` and the message stays `pending`.
    pub async fn submit_audio_turn(
        &self,
        submission: AudioSubmission,
    ) -> Result<AcceptedTurn, ParlanceError> {
        let AudioSubmission {
            user_id,
            thread_id,
            audio,
            content_type,
            expected_text,
        } = submission;
        let cost = self.costs.cost_of(TurnKind::Audio);

        self.verify_owner(&user_id, &thread_id).await?;
        // Fail fast before uploading; the transaction below re-checks.
        let available = match self.ledger.credits(&user_id).await {
            Ok(credits) => credits.balance,
            Err(ParlanceError::NotFound { .. }) => 0,
            Err(e) => return Err(e),
        };
        if cost > 0 && available < cost {
            warn!(user_id = %user_id, required = cost, available, "audio turn rejected");
            return Err(ParlanceError::InsufficientCredits {
                user_id: user_id.to_string(),
                required: cost,
                available,
            });
        }

        let message_id = MessageId::generate();
        let key_hint = format!(
            "user/{}/{}.{}",
            thread_id,
            message_id,
            extension_for(&content_type)
        );
        let audio_ref = self.blobs.put(audio, &content_type, &key_hint).await?;

        let message = Message::user_audio(message_id.clone(), thread_id.clone(), audio_ref.clone());
        let reason = CostSchedule::reason_for(TurnKind::Audio);
        let user = user_id.clone();
        let persisted = self
            .store
            .transaction(work(move |scope| {
                let charge = charge_turn(scope, &user, cost, &reason, &message.id)?;
                scope.insert_message(&message)?;
                let at = now_timestamp();
                if !scope.mark_pronunciation_pending(&message.id, &at)? {
                    return Err(transition_error(scope, &message.id, PronunciationStatus::Pending));
                }
                let mut message = message;
                message.pronunciation_status = PronunciationStatus::Pending;
                message.pronunciation_updated_at = Some(at);
                Ok(AcceptedTurn {
                    message,
                    charge,
                    queued: false,
                })
            }))
            .await;

        let mut accepted = match persisted {
            Ok(accepted) => accepted,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&audio_ref).await {
                    warn!(audio_ref, error = %cleanup, "failed to remove orphaned audio");
                }
                return Err(e);
            }
        };

        let job = PronunciationJob {
            message_id: message_id.clone(),
            user_id: user_id.clone(),
            audio_ref,
            expected_text,
            deadline: self.job_deadline,
        };
        match self.queue.submit(job).await {
            Ok(()) => accepted.queued = true,
            Err(e) => warn!(
                user_id = %user_id,
                message_id = %message_id,
                error = %e,
                "audio turn accepted but not queued; left pending"
            ),
        }

        info!(
            user_id = %user_id,
            message_id = %message_id,
            cost,
            queued = accepted.queued,
            "audio turn accepted"
        );
        Ok(accepted)
    }

    /// Charges a text turn and stores the message. Text turns are never analyzed.
    pub async fn record_text_turn(
        &self,
        user_id: &UserId,
        thread_id: &ThreadId,
        content: &str,
    ) -> Result<AcceptedTurn, ParlanceError> {
        self.verify_owner(user_id, thread_id).await?;
        let cost = self.costs.cost_of(TurnKind::Text);
        let reason = CostSchedule::reason_for(TurnKind::Text);
        let message = Message::text(thread_id.clone(), Role::User, content.to_string());
        let user = user_id.clone();

        let accepted = self
            .store
            .transaction(work(move |scope| {
                let charge = charge_turn(scope, &user, cost, &reason, &message.id)?;
                scope.insert_message(&message)?;
                Ok(AcceptedTurn {
                    message,
                    charge,
                    queued: false,
                })
            }))
            .await?;

        info!(user_id = %user_id, message_id = %accepted.message.id, cost, "text turn recorded");
        Ok(accepted)
    }
}

/// File extension for an audio content type.
fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "audio/webm" => "webm",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/flac" => "flac",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::types::TransactionKind;
    use parlance_test_utils::fixtures::thread_for;
    use parlance_test_utils::{MemoryStore, MockBlobStore};
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    const COSTS: CostSchedule = CostSchedule {
        text_turn_cost: 1,
        audio_turn_cost: 3,
    };

    struct Harness {
        store: MemoryStore,
        blobs: Arc<MockBlobStore>,
        intake: Intake<MemoryStore>,
        jobs: mpsc::Receiver<PronunciationJob>,
    }

    fn harness(balance: Option<i64>) -> Harness {
        let store = MemoryStore::new();
        let user = UserId("u1".into());
        store.seed_thread(thread_for(&user, "t1"));
        store.seed_thread(thread_for(&UserId("u2".into()), "t2"));
        if let Some(balance) = balance {
            store.seed_credits(&user, balance);
        }
        let blobs = Arc::new(MockBlobStore::new());
        let (queue, jobs) = JobQueue::channel(4);
        let intake = Intake::new(
            Arc::new(store.clone()),
            blobs.clone(),
            queue,
            COSTS,
            Duration::from_secs(30),
        );
        Harness {
            store,
            blobs,
            intake,
            jobs,
        }
    }

    fn submission(thread: &str) -> AudioSubmission {
        AudioSubmission {
            user_id: UserId("u1".into()),
            thread_id: ThreadId(thread.into()),
            audio: b"OggS".to_vec(),
            content_type: "audio/webm;codecs=opus".into(),
            expected_text: Some("think".into()),
        }
    }

    #[tokio::test]
    async fn accepted_audio_turn_is_charged_and_queued() {
        let mut h = harness(Some(10));
        let accepted = h.intake.submit_audio_turn(submission("t1")).await.unwrap();

        let id = accepted.message.id.clone();
        assert_eq!(accepted.message.pronunciation_status, PronunciationStatus::Pending);
        let charge = accepted.charge.unwrap();
        assert_eq!(charge.amount, -3);
        assert_eq!(charge.balance_after, 7);
        assert_eq!(charge.reference.as_deref(), Some(id.as_str()));

        let state = h.store.snapshot();
        assert_eq!(state.credits[&UserId("u1".into())].balance, 7);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].pronunciation_status, PronunciationStatus::Pending);
        let expected_ref = format!("mem://user/t1/{id}.webm");
        assert_eq!(state.messages[0].audio_ref.as_deref(), Some(expected_ref.as_str()));

        assert!(accepted.queued);
        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.message_id, id);
        assert_eq!(job.audio_ref, expected_ref);
        assert_eq!(job.expected_text.as_deref(), Some("think"));
        assert_eq!(job.deadline, Duration::from_secs(30));
        assert_eq!(
            h.blobs.content_type(&expected_ref).await.as_deref(),
            Some("audio/webm;codecs=opus")
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn insufficient_credits_leave_nothing_behind() {
        let mut h = harness(Some(2));
        let err = h.intake.submit_audio_turn(submission("t1")).await.unwrap_err();
        assert!(matches!(
            err,
            ParlanceError::InsufficientCredits {
                required: 3,
                available: 2,
                ..
            }
        ));

        let state = h.store.snapshot();
        assert!(state.messages.is_empty());
        assert_eq!(state.credits[&UserId("u1".into())].balance, 2);
        assert_eq!(state.transactions.len(), 1);
        assert!(h.blobs.is_empty().await);
        assert!(h.jobs.try_recv().is_err());
        assert!(logs_contain("audio turn rejected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn stopped_queue_still_accepts_the_charged_turn() {
        let Harness {
            store,
            intake,
            jobs,
            ..
        } = harness(Some(10));
        drop(jobs);

        let accepted = intake.submit_audio_turn(submission("t1")).await.unwrap();
        assert!(!accepted.queued);
        assert!(accepted.charge.is_some());

        let state = store.snapshot();
        assert_eq!(state.credits[&UserId("u1".into())].balance, 7);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].id, accepted.message.id);
        assert_eq!(state.messages[0].pronunciation_status, PronunciationStatus::Pending);
        assert!(logs_contain("accepted but not queued"));
    }

    #[tokio::test]
    async fn credits_read_failure_is_not_reported_as_insufficient() {
        let h = harness(Some(10));
        h.store.fail_on("get_credits");
        let err = h.intake.submit_audio_turn(submission("t1")).await.unwrap_err();
        assert!(matches!(err, ParlanceError::Storage { .. }));
        assert!(h.store.snapshot().messages.is_empty());
        assert!(h.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn user_without_credits_row_is_rejected() {
        let h = harness(None);
        let err = h.intake.submit_audio_turn(submission("t1")).await.unwrap_err();
        assert!(matches!(err, ParlanceError::InsufficientCredits { available: 0, .. }));
    }

    #[tokio::test]
    async fn foreign_thread_is_not_found() {
        let mut h = harness(Some(10));
        for thread in ["t2", "missing"] {
            let err = h.intake.submit_audio_turn(submission(thread)).await.unwrap_err();
            assert!(matches!(err, ParlanceError::NotFound { entity: "thread", .. }));
        }
        assert_eq!(h.store.snapshot().credits[&UserId("u1".into())].balance, 10);
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_persist_removes_uploaded_audio() {
        let h = harness(Some(10));
        h.store.fail_on("insert_message");
        let err = h.intake.submit_audio_turn(submission("t1")).await.unwrap_err();
        assert!(matches!(err, ParlanceError::Storage { .. }));

        let state = h.store.snapshot();
        assert_eq!(state.credits[&UserId("u1".into())].balance, 10);
        assert!(state.messages.is_empty());
        assert!(h.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn text_turn_is_charged_but_not_analyzed() {
        let mut h = harness(Some(10));
        let accepted = h
            .intake
            .record_text_turn(&UserId("u1".into()), &ThreadId("t1".into()), "hello")
            .await
            .unwrap();
        assert_eq!(accepted.message.content, "hello");
        assert_eq!(accepted.message.pronunciation_status, PronunciationStatus::None);
        assert!(!accepted.queued);
        assert_eq!(accepted.charge.map(|c| c.kind), Some(TransactionKind::Debit));

        assert_eq!(h.store.snapshot().credits[&UserId("u1".into())].balance, 9);
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn free_turns_write_no_transaction() {
        let h = harness(Some(1));
        let (queue, _jobs) = JobQueue::channel(1);
        let intake = Intake::new(
            Arc::new(h.store.clone()),
            h.blobs.clone(),
            queue,
            CostSchedule {
                text_turn_cost: 0,
                audio_turn_cost: 3,
            },
            Duration::from_secs(30),
        );
        let accepted = intake
            .record_text_turn(&UserId("u1".into()), &ThreadId("t1".into()), "hi")
            .await
            .unwrap();
        assert!(accepted.charge.is_none());
        assert_eq!(h.store.snapshot().transactions.len(), 1);
    }

    #[test]
    fn extensions_follow_content_type() {
        assert_eq!(extension_for("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for("Audio/WAV"), "wav");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
