// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use parlance_core::types::{PhonemeStats, PhonemeSubstitution, UserId};
use serde::Serialize;

/// One user's accumulated pronunciation picture.
#[derive(Debug, Clone, Serialize)]
pub struct PhonemeReport {
    pub user_id: UserId,
    pub total_attempts: i64,
    pub total_correct: i64,
    /// Percent, 0 when nothing has been attempted.
    pub overall_accuracy: f64,
    /// Weakest phoneme first.
    pub phonemes: Vec<PhonemeStats>,
    /// Most frequent first.
    pub top_substitutions: Vec<PhonemeSubstitution>,
}

impl PhonemeReport {
    pub fn new(
        user_id: UserId,
        mut phonemes: Vec<PhonemeStats>,
        mut top_substitutions: Vec<PhonemeSubstitution>,
    ) -> Self {
        let total_attempts: i64 = phonemes.iter().map(|p| p.total_attempts).sum();
        let total_correct: i64 = phonemes.iter().map(|p| p.correct_count).sum();
        let overall_accuracy = if total_attempts == 0 {
            0.0
        } else {
            total_correct as f64 / total_attempts as f64 * 100.0
        };

        // Ties: more attempts first, then symbol for a stable order.
        phonemes.sort_by(|a, b| {
            a.accuracy()
                .total_cmp(&b.accuracy())
                .then(b.total_attempts.cmp(&a.total_attempts))
                .then_with(|| a.phoneme.cmp(&b.phoneme))
        });
        top_substitutions.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.expected_phoneme.cmp(&b.expected_phoneme))
                .then_with(|| a.actual_phoneme.cmp(&b.actual_phoneme))
        });

        Self {
            user_id,
            total_attempts,
            total_correct,
            overall_accuracy,
            phonemes,
            top_substitutions,
        }
    }

    /// The `n` lowest-accuracy phonemes.
    pub fn weakest(&self, n: usize) -> &[PhonemeStats] {
        &self.phonemes[..n.min(self.phonemes.len())]
    }
}
