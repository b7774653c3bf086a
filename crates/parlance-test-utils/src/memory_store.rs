// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`UnitOfWork`] for deterministic tests.
//!
//! `MemoryStore` implements every repository trait over plain collections,
//! records the name of each repository call it receives, and gives
//! transactions real rollback: the closure runs against a copy of the state
//! which replaces the original only when the closure returns `Ok`.
//! The state lock is held for the whole unit of work, so transactions are
//! serialized like SQLite's `IMMEDIATE` transactions.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use parlance_core::types::{
    CreditTransaction, Credits, Message, MessageId, PhonemeStats, PhonemeSubstitution,
    PronunciationStatus, Thread, ThreadId, UserId, now_timestamp,
};
use parlance_core::{
    CreditRepo, MessageRepo, ParlanceError, PhonemeDelta, PhonemeStatsRepo,
    PronunciationCompletion, ThreadRepo, UnitOfWork, Work,
};

/// Snapshot of everything a [`MemoryStore`] holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub threads: HashMap<ThreadId, Thread>,
    /// Insertion order is creation order.
    pub messages: Vec<Message>,
    pub credits: HashMap<UserId, Credits>,
    /// Append order.
    pub transactions: Vec<CreditTransaction>,
    pub phoneme_stats: BTreeMap<(UserId, String), PhonemeStats>,
    pub substitutions: BTreeMap<(UserId, String, String), PhonemeSubstitution>,
}

#[derive(Default)]
struct Inner {
    state: MemoryState,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
}

/// In-memory store implementing the same traits as `SqliteStorage`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test closure poisons the lock; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current committed state.
    pub fn snapshot(&self) -> MemoryState {
        self.lock().state.clone()
    }

    /// Names of the repository methods called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// How many times `method` has been called.
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == method).count()
    }

    /// Makes every later call to `method` fail with a storage error.
    pub fn fail_on(&self, method: &'static str) {
        self.lock().failing.insert(method);
    }

    /// Seeds a thread directly, bypassing call recording.
    pub fn seed_thread(&self, thread: Thread) {
        self.lock().state.threads.insert(thread.id.clone(), thread);
    }

    /// Seeds a credits row and its opening grant, keeping the ledger invariant.
    pub fn seed_credits(&self, user_id: &UserId, balance: i64) {
        let at = now_timestamp();
        let mut inner = self.lock();
        inner.state.credits.insert(
            user_id.clone(),
            Credits {
                user_id: user_id.clone(),
                balance,
                monthly_allowance: balance,
                used_this_period: 0,
                last_refreshed_at: at.clone(),
                created_at: at.clone(),
                updated_at: at,
            },
        );
        inner.state.transactions.push(CreditTransaction::new(
            user_id.clone(),
            parlance_core::types::TransactionKind::Grant,
            balance,
            balance,
            None,
            "seed",
        ));
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn ambient<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut scope = MemoryScope::new(&mut inner.state, &inner.failing);
        let outcome = work(&mut scope);
        let calls = scope.calls.into_inner();
        inner.calls.extend(calls);
        outcome
    }

    async fn transaction<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut working = inner.state.clone();
        let mut scope = MemoryScope::new(&mut working, &inner.failing);
        let outcome = work(&mut scope);
        let calls = scope.calls.into_inner();
        inner.calls.extend(calls);
        if outcome.is_ok() {
            inner.state = working;
        }
        outcome
    }
}

/// Repositories over borrowed [`MemoryState`].
pub struct MemoryScope<'a> {
    state: &'a mut MemoryState,
    calls: RefCell<Vec<&'static str>>,
    failing: &'a HashSet<&'static str>,
}

impl<'a> MemoryScope<'a> {
    fn new(state: &'a mut MemoryState, failing: &'a HashSet<&'static str>) -> Self {
        Self {
            state,
            calls: RefCell::new(Vec::new()),
            failing,
        }
    }

    fn record(&self, method: &'static str) -> Result<(), ParlanceError> {
        self.calls.borrow_mut().push(method);
        if self.failing.contains(method) {
            return Err(ParlanceError::Storage {
                source: format!("injected failure in {method}").into(),
            });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        id: &MessageId,
        from: PronunciationStatus,
        apply: impl FnOnce(&mut Message),
    ) -> bool {
        match self
            .state
            .messages
            .iter_mut()
            .find(|m| &m.id == id && m.pronunciation_status == from)
        {
            Some(message) => {
                apply(message);
                true
            }
            None => false,
        }
    }
}

impl CreditRepo for MemoryScope<'_> {
    fn get_credits(&self, user_id: &UserId) -> Result<Option<Credits>, ParlanceError> {
        self.record("get_credits")?;
        Ok(self.state.credits.get(user_id).cloned())
    }

    fn insert_credits(&mut self, credits: &Credits) -> Result<(), ParlanceError> {
        self.record("insert_credits")?;
        if self.state.credits.contains_key(&credits.user_id) {
            return Err(ParlanceError::Storage {
                source: format!("duplicate credits row for {}", credits.user_id).into(),
            });
        }
        self.state
            .credits
            .insert(credits.user_id.clone(), credits.clone());
        Ok(())
    }

    fn apply_balance_delta(
        &mut self,
        user_id: &UserId,
        delta: i64,
        usage_delta: i64,
    ) -> Result<i64, ParlanceError> {
        self.record("apply_balance_delta")?;
        let row = self
            .state
            .credits
            .get_mut(user_id)
            .ok_or_else(|| ParlanceError::not_found("credits", user_id.as_str()))?;
        let balance = row.balance + delta;
        if balance < 0 {
            return Err(ParlanceError::Storage {
                source: "CHECK constraint failed: balance >= 0".into(),
            });
        }
        row.balance = balance;
        row.used_this_period += usage_delta;
        row.updated_at = now_timestamp();
        Ok(balance)
    }

    fn reset_period(
        &mut self,
        user_id: &UserId,
        balance: i64,
        at: &str,
    ) -> Result<(), ParlanceError> {
        self.record("reset_period")?;
        let row = self
            .state
            .credits
            .get_mut(user_id)
            .ok_or_else(|| ParlanceError::not_found("credits", user_id.as_str()))?;
        row.balance = balance;
        row.used_this_period = 0;
        row.last_refreshed_at = at.to_string();
        row.updated_at = at.to_string();
        Ok(())
    }

    fn set_allowance(&mut self, user_id: &UserId, allowance: i64) -> Result<(), ParlanceError> {
        self.record("set_allowance")?;
        let row = self
            .state
            .credits
            .get_mut(user_id)
            .ok_or_else(|| ParlanceError::not_found("credits", user_id.as_str()))?;
        row.monthly_allowance = allowance;
        row.updated_at = now_timestamp();
        Ok(())
    }

    fn insert_credit_transaction(&mut self, tx: &CreditTransaction) -> Result<(), ParlanceError> {
        self.record("insert_credit_transaction")?;
        self.state.transactions.push(tx.clone());
        Ok(())
    }

    fn credit_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>, ParlanceError> {
        self.record("credit_transactions")?;
        Ok(self
            .state
            .transactions
            .iter()
            .rev()
            .filter(|tx| &tx.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn credit_transaction_sum(&self, user_id: &UserId) -> Result<i64, ParlanceError> {
        self.record("credit_transaction_sum")?;
        Ok(self
            .state
            .transactions
            .iter()
            .filter(|tx| &tx.user_id == user_id)
            .map(|tx| tx.amount)
            .sum())
    }
}

impl MessageRepo for MemoryScope<'_> {
    fn insert_message(&mut self, message: &Message) -> Result<(), ParlanceError> {
        self.record("insert_message")?;
        if !self.state.threads.contains_key(&message.thread_id) {
            return Err(ParlanceError::Storage {
                source: "FOREIGN KEY constraint failed".into(),
            });
        }
        if self.state.messages.iter().any(|m| m.id == message.id) {
            return Err(ParlanceError::Storage {
                source: format!("duplicate message id {}", message.id).into(),
            });
        }
        self.state.messages.push(message.clone());
        Ok(())
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>, ParlanceError> {
        self.record("get_message")?;
        Ok(self.state.messages.iter().find(|m| &m.id == id).cloned())
    }

    fn messages_for_thread(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ParlanceError> {
        self.record("messages_for_thread")?;
        Ok(self
            .state
            .messages
            .iter()
            .filter(|m| &m.thread_id == thread_id)
            .cloned()
            .collect())
    }

    fn mark_pronunciation_pending(
        &mut self,
        id: &MessageId,
        at: &str,
    ) -> Result<bool, ParlanceError> {
        self.record("mark_pronunciation_pending")?;
        Ok(self.transition(id, PronunciationStatus::None, |m| {
            m.pronunciation_status = PronunciationStatus::Pending;
            m.pronunciation_updated_at = Some(at.to_string());
        }))
    }

    fn complete_pronunciation(
        &mut self,
        id: &MessageId,
        completion: &PronunciationCompletion,
    ) -> Result<bool, ParlanceError> {
        self.record("complete_pronunciation")?;
        Ok(self.transition(id, PronunciationStatus::Pending, |m| {
            m.pronunciation_status = PronunciationStatus::Complete;
            m.pronunciation_result = Some(completion.result.clone());
            m.pronunciation_error = None;
            if m.content.is_empty() {
                m.content = completion.transcript.clone();
            }
            if completion.audio_duration_secs.is_some() {
                m.audio_duration_secs = completion.audio_duration_secs;
            }
            m.pronunciation_updated_at = Some(completion.completed_at.clone());
        }))
    }

    fn fail_pronunciation(
        &mut self,
        id: &MessageId,
        error: &str,
        at: &str,
    ) -> Result<bool, ParlanceError> {
        self.record("fail_pronunciation")?;
        Ok(self.transition(id, PronunciationStatus::Pending, |m| {
            m.pronunciation_status = PronunciationStatus::Failed;
            m.pronunciation_error = Some(error.to_string());
            m.pronunciation_updated_at = Some(at.to_string());
        }))
    }
}

impl ThreadRepo for MemoryScope<'_> {
    fn insert_thread(&mut self, thread: &Thread) -> Result<(), ParlanceError> {
        self.record("insert_thread")?;
        self.state.threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, ParlanceError> {
        self.record("get_thread")?;
        Ok(self.state.threads.get(id).cloned())
    }
}

impl PhonemeStatsRepo for MemoryScope<'_> {
    fn increment_phoneme_stats(
        &mut self,
        user_id: &UserId,
        phoneme: &str,
        delta: &PhonemeDelta,
        at: &str,
    ) -> Result<(), ParlanceError> {
        self.record("increment_phoneme_stats")?;
        let row = self
            .state
            .phoneme_stats
            .entry((user_id.clone(), phoneme.to_string()))
            .or_insert_with(|| PhonemeStats {
                user_id: user_id.clone(),
                phoneme: phoneme.to_string(),
                total_attempts: 0,
                correct_count: 0,
                deletion_count: 0,
                created_at: at.to_string(),
                updated_at: at.to_string(),
            });
        row.total_attempts += delta.attempts;
        row.correct_count += delta.correct;
        row.deletion_count += delta.deletions;
        row.updated_at = at.to_string();
        Ok(())
    }

    fn increment_substitution(
        &mut self,
        user_id: &UserId,
        expected: &str,
        actual: &str,
        count: i64,
        at: &str,
    ) -> Result<(), ParlanceError> {
        self.record("increment_substitution")?;
        let row = self
            .state
            .substitutions
            .entry((user_id.clone(), expected.to_string(), actual.to_string()))
            .or_insert_with(|| PhonemeSubstitution {
                user_id: user_id.clone(),
                expected_phoneme: expected.to_string(),
                actual_phoneme: actual.to_string(),
                occurrence_count: 0,
                created_at: at.to_string(),
                updated_at: at.to_string(),
            });
        row.occurrence_count += count;
        row.updated_at = at.to_string();
        Ok(())
    }

    fn phoneme_stats(&self, user_id: &UserId) -> Result<Vec<PhonemeStats>, ParlanceError> {
        self.record("phoneme_stats")?;
        Ok(self
            .state
            .phoneme_stats
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn top_substitutions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PhonemeSubstitution>, ParlanceError> {
        self.record("top_substitutions")?;
        let mut subs: Vec<PhonemeSubstitution> = self
            .state
            .substitutions
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
        subs.truncate(limit);
        Ok(subs)
    }
}
