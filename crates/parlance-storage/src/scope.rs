// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository implementations over a borrowed SQLite connection.
//!
//! A [`SqliteScope`] wraps either the ambient connection or an open
//! transaction; the repository code is identical in both cases.

use parlance_core::types::{
    CreditTransaction, Credits, Message, MessageId, PhonemeStats, PhonemeSubstitution, Thread,
    ThreadId, UserId, now_timestamp,
};
use parlance_core::{
    CreditRepo, MessageRepo, ParlanceError, PhonemeDelta, PhonemeStatsRepo,
    PronunciationCompletion, ThreadRepo,
};
use rusqlite::Connection;

use crate::database::map_sql_err;
use crate::queries::{credits, messages, phoneme_stats, threads};

/// Repositories bound to one connection or transaction.
pub struct SqliteScope<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteScope<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl CreditRepo for SqliteScope<'_> {
    fn get_credits(&self, user_id: &UserId) -> Result<Option<Credits>, ParlanceError> {
        credits::get_credits(self.conn, user_id.as_str()).map_err(map_sql_err)
    }

    fn insert_credits(&mut self, row: &Credits) -> Result<(), ParlanceError> {
        credits::insert_credits(self.conn, row).map_err(map_sql_err)
    }

    fn apply_balance_delta(
        &mut self,
        user_id: &UserId,
        delta: i64,
        usage_delta: i64,
    ) -> Result<i64, ParlanceError> {
        credits::apply_balance_delta(
            self.conn,
            user_id.as_str(),
            delta,
            usage_delta,
            &now_timestamp(),
        )
        .map_err(map_sql_err)?
        .ok_or_else(|| ParlanceError::not_found("credits", user_id.as_str()))
    }

    fn reset_period(
        &mut self,
        user_id: &UserId,
        balance: i64,
        at: &str,
    ) -> Result<(), ParlanceError> {
        match credits::reset_period(self.conn, user_id.as_str(), balance, at)
            .map_err(map_sql_err)?
        {
            0 => Err(ParlanceError::not_found("credits", user_id.as_str())),
            _ => Ok(()),
        }
    }

    fn set_allowance(&mut self, user_id: &UserId, allowance: i64) -> Result<(), ParlanceError> {
        match credits::set_allowance(self.conn, user_id.as_str(), allowance, &now_timestamp())
            .map_err(map_sql_err)?
        {
            0 => Err(ParlanceError::not_found("credits", user_id.as_str())),
            _ => Ok(()),
        }
    }

    fn insert_credit_transaction(&mut self, tx: &CreditTransaction) -> Result<(), ParlanceError> {
        credits::insert_transaction(self.conn, tx).map_err(map_sql_err)
    }

    fn credit_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>, ParlanceError> {
        credits::list_transactions(self.conn, user_id.as_str(), limit).map_err(map_sql_err)
    }

    fn credit_transaction_sum(&self, user_id: &UserId) -> Result<i64, ParlanceError> {
        credits::transaction_sum(self.conn, user_id.as_str()).map_err(map_sql_err)
    }
}

impl MessageRepo for SqliteScope<'_> {
    fn insert_message(&mut self, message: &Message) -> Result<(), ParlanceError> {
        messages::insert_message(self.conn, message).map_err(map_sql_err)
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>, ParlanceError> {
        messages::get_message(self.conn, id.as_str()).map_err(map_sql_err)
    }

    fn messages_for_thread(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ParlanceError> {
        messages::messages_for_thread(self.conn, thread_id.as_str()).map_err(map_sql_err)
    }

    fn mark_pronunciation_pending(
        &mut self,
        id: &MessageId,
        at: &str,
    ) -> Result<bool, ParlanceError> {
        messages::mark_pending(self.conn, id.as_str(), at).map_err(map_sql_err)
    }

    fn complete_pronunciation(
        &mut self,
        id: &MessageId,
        completion: &PronunciationCompletion,
    ) -> Result<bool, ParlanceError> {
        messages::mark_complete(
            self.conn,
            id.as_str(),
            &completion.transcript,
            &completion.result,
            completion.audio_duration_secs,
            &completion.completed_at,
        )
        .map_err(map_sql_err)
    }

    fn fail_pronunciation(
        &mut self,
        id: &MessageId,
        error: &str,
        at: &str,
    ) -> Result<bool, ParlanceError> {
        messages::mark_failed(self.conn, id.as_str(), error, at).map_err(map_sql_err)
    }
}

impl ThreadRepo for SqliteScope<'_> {
    fn insert_thread(&mut self, thread: &Thread) -> Result<(), ParlanceError> {
        threads::insert_thread(self.conn, thread).map_err(map_sql_err)
    }

    fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, ParlanceError> {
        threads::get_thread(self.conn, id.as_str()).map_err(map_sql_err)
    }
}

impl PhonemeStatsRepo for SqliteScope<'_> {
    fn increment_phoneme_stats(
        &mut self,
        user_id: &UserId,
        phoneme: &str,
        delta: &PhonemeDelta,
        at: &str,
    ) -> Result<(), ParlanceError> {
        phoneme_stats::increment_phoneme(
            self.conn,
            user_id.as_str(),
            phoneme,
            delta.attempts,
            delta.correct,
            delta.deletions,
            at,
        )
        .map_err(map_sql_err)
    }

    fn increment_substitution(
        &mut self,
        user_id: &UserId,
        expected: &str,
        actual: &str,
        count: i64,
        at: &str,
    ) -> Result<(), ParlanceError> {
        phoneme_stats::increment_substitution(
            self.conn,
            user_id.as_str(),
            expected,
            actual,
            count,
            at,
        )
        .map_err(map_sql_err)
    }

    fn phoneme_stats(&self, user_id: &UserId) -> Result<Vec<PhonemeStats>, ParlanceError> {
        phoneme_stats::list_stats(self.conn, user_id.as_str()).map_err(map_sql_err)
    }

    fn top_substitutions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PhonemeSubstitution>, ParlanceError> {
        phoneme_stats::top_substitutions(self.conn, user_id.as_str(), limit).map_err(map_sql_err)
    }
}
