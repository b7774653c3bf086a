// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-entity repository traits.
//!
//! Methods are synchronous: they run inside a [`Scope`](super::scope::Scope)
//! that already owns a connection or transaction. Reads take `&self`,
//! writes take `&mut self`.

use crate::error::ParlanceError;
use crate::types::{
    CreditTransaction, Credits, Message, MessageId, PhonemeStats, PhonemeSubstitution, Thread,
    ThreadId, UserId,
};

/// Credits rows and the append-only transaction log.
pub trait CreditRepo {
    fn get_credits(&self, user_id: &UserId) -> Result<Option<Credits>, ParlanceError>;

    fn insert_credits(&mut self, credits: &Credits) -> Result<(), ParlanceError>;

    /// Adds `delta` to the balance and `usage_delta` to `used_this_period`.
    ///
    /// Returns the new balance. Fails with `NotFound` when no row exists and
    /// with a storage error if the balance would go negative.
    fn apply_balance_delta(
        &mut self,
        user_id: &UserId,
        delta: i64,
        usage_delta: i64,
    ) -> Result<i64, ParlanceError>;

    /// Sets the balance outright and starts a new usage period at `at`.
    fn reset_period(&mut self, user_id: &UserId, balance: i64, at: &str)
    -> Result<(), ParlanceError>;

    fn set_allowance(&mut self, user_id: &UserId, allowance: i64) -> Result<(), ParlanceError>;

    fn insert_credit_transaction(&mut self, tx: &CreditTransaction) -> Result<(), ParlanceError>;

    /// Newest first.
    fn credit_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>, ParlanceError>;

    /// Signed sum of every transaction amount for the user.
    fn credit_transaction_sum(&self, user_id: &UserId) -> Result<i64, ParlanceError>;
}

/// Values written when an analysis completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PronunciationCompletion {
    /// Written to `content` only if the message has no content yet.
    pub transcript: String,
    pub result: serde_json::Value,
    pub audio_duration_secs: Option<f64>,
    pub completed_at: String,
}

/// Message rows and their guarded pronunciation transitions.
///
/// Each transition method returns `false` when the row was not in the
/// expected source state (or does not exist). Nothing is written in that case.
pub trait MessageRepo {
    fn insert_message(&mut self, message: &Message) -> Result<(), ParlanceError>;

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>, ParlanceError>;

    /// Oldest first.
    fn messages_for_thread(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ParlanceError>;

    /// `none → pending`.
    fn mark_pronunciation_pending(&mut self, id: &MessageId, at: &str)
    -> Result<bool, ParlanceError>;

    /// `pending → complete`.
    fn complete_pronunciation(
        &mut self,
        id: &MessageId,
        completion: &PronunciationCompletion,
    ) -> Result<bool, ParlanceError>;

    /// `pending → failed`.
    fn fail_pronunciation(
        &mut self,
        id: &MessageId,
        error: &str,
        at: &str,
    ) -> Result<bool, ParlanceError>;
}

pub trait ThreadRepo {
    fn insert_thread(&mut self, thread: &Thread) -> Result<(), ParlanceError>;

    fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, ParlanceError>;
}

/// Counter increments for one phoneme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhonemeDelta {
    pub attempts: i64,
    pub correct: i64,
    pub deletions: i64,
}

/// Accumulate-only phoneme counters.
pub trait PhonemeStatsRepo {
    /// Creates the row on first observation, otherwise adds the deltas in place.
    fn increment_phoneme_stats(
        &mut self,
        user_id: &UserId,
        phoneme: &str,
        delta: &PhonemeDelta,
        at: &str,
    ) -> Result<(), ParlanceError>;

    fn increment_substitution(
        &mut self,
        user_id: &UserId,
        expected: &str,
        actual: &str,
        count: i64,
        at: &str,
    ) -> Result<(), ParlanceError>;

    fn phoneme_stats(&self, user_id: &UserId) -> Result<Vec<PhonemeStats>, ParlanceError>;

    /// Highest `occurrence_count` first.
    fn top_substitutions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PhonemeSubstitution>, ParlanceError>;
}
