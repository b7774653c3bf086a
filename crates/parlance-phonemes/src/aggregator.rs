// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds analysis outcomes into per-user phoneme counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use parlance_core::types::{
    PhonemeOutcome, PronunciationAnalysis, SubstitutionEvent, UserId, now_timestamp,
};
use parlance_core::{ParlanceError, PhonemeDelta, PhonemeStatsRepo, UnitOfWork, work};
use tracing::debug;

use crate::report::PhonemeReport;

/// Substitutions shown in a user report.
pub const REPORT_SUBSTITUTION_LIMIT: usize = 10;

/// Deltas for one analysis, pre-aggregated per phoneme and per substitution
/// pair so each key is written once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub phonemes: BTreeMap<String, PhonemeDelta>,
    pub substitutions: BTreeMap<(String, String), i64>,
}

impl Tally {
    pub fn new(outcomes: &[PhonemeOutcome], substitutions: &[SubstitutionEvent]) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            let delta = tally.phonemes.entry(outcome.phoneme.clone()).or_default();
            delta.attempts += 1;
            delta.correct += i64::from(outcome.correct);
            delta.deletions += i64::from(outcome.deleted);
        }
        for event in substitutions {
            *tally
                .substitutions
                .entry((event.expected_phoneme.clone(), event.actual_phoneme.clone()))
                .or_default() += 1;
        }
        tally
    }

    pub fn from_analysis(analysis: &PronunciationAnalysis) -> Self {
        Self::new(&analysis.outcomes(), &analysis.substitution_events())
    }

    pub fn is_empty(&self) -> bool {
        self.phonemes.is_empty() && self.substitutions.is_empty()
    }
}

/// Applies `tally` inside an already open scope.
pub fn record_in<S: PhonemeStatsRepo + ?Sized>(
    scope: &mut S,
    user_id: &UserId,
    tally: &Tally,
    at: &str,
) -> Result<(), ParlanceError> {
    for (phoneme, delta) in &tally.phonemes {
        scope.increment_phoneme_stats(user_id, phoneme, delta, at)?;
    }
    for ((expected, actual), count) in &tally.substitutions {
        scope.increment_substitution(user_id, expected, actual, *count, at)?;
    }
    Ok(())
}

/// Phoneme statistics over any [`UnitOfWork`].
pub struct PhonemeAggregator<U> {
    store: Arc<U>,
}

impl<U> Clone for PhonemeAggregator<U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<U: UnitOfWork> PhonemeAggregator<U> {
    pub fn new(store: Arc<U>) -> Self {
        Self { store }
    }

    /// Records one analysis worth of outcomes in its own transaction.
    pub async fn record_analysis(
        &self,
        user_id: &UserId,
        outcomes: &[PhonemeOutcome],
        substitutions: &[SubstitutionEvent],
    ) -> Result<(), ParlanceError> {
        let tally = Tally::new(outcomes, substitutions);
        if tally.is_empty() {
            return Ok(());
        }
        let phonemes = tally.phonemes.len();
        let user = user_id.clone();
        self.store
            .transaction(work(move |scope| {
                record_in(scope, &user, &tally, &now_timestamp())
            }))
            .await?;
        debug!(user_id = %user_id, phonemes, "phoneme stats recorded");
        Ok(())
    }

    pub async fn user_report(&self, user_id: &UserId) -> Result<PhonemeReport, ParlanceError> {
        let user = user_id.clone();
        let (stats, substitutions) = self
            .store
            .ambient(work(move |scope| {
                let stats = scope.phoneme_stats(&user)?;
                let subs = scope.top_substitutions(&user, REPORT_SUBSTITUTION_LIMIT)?;
                Ok((stats, subs))
            }))
            .await?;
        Ok(PhonemeReport::new(user_id.clone(), stats, substitutions))
    }
}
