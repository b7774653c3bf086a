// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording order never changes the accumulated counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use parlance_core::types::{PhonemeOutcome, SubstitutionEvent, UserId};
use parlance_phonemes::PhonemeAggregator;
use parlance_test_utils::{MemoryState, MemoryStore};
use proptest::prelude::*;

const PHONEMES: &[&str] = &["θ", "ð", "ɪ", "i", "r", "l", "ŋ"];

type Batch = (Vec<PhonemeOutcome>, Vec<SubstitutionEvent>);

fn batch() -> impl Strategy<Value = Batch> {
    let outcome = (0..PHONEMES.len(), 0u8..3).prop_map(|(i, kind)| PhonemeOutcome {
        phoneme: PHONEMES[i].to_string(),
        correct: kind == 0,
        deleted: kind == 1,
    });
    let event = (0..PHONEMES.len(), 0..PHONEMES.len()).prop_map(|(e, a)| SubstitutionEvent {
        expected_phoneme: PHONEMES[e].to_string(),
        actual_phoneme: PHONEMES[a].to_string(),
    });
    (
        prop::collection::vec(outcome, 0..12),
        prop::collection::vec(event, 0..4),
    )
}

/// Counters only; timestamps depend on wall-clock order.
fn counters(state: &MemoryState) -> (BTreeMap<String, (i64, i64, i64)>, BTreeMap<(String, String), i64>) {
    let stats = state
        .phoneme_stats
        .values()
        .map(|s| {
            (
                s.phoneme.clone(),
                (s.total_attempts, s.correct_count, s.deletion_count),
            )
        })
        .collect();
    let subs = state
        .substitutions
        .values()
        .map(|s| {
            (
                (s.expected_phoneme.clone(), s.actual_phoneme.clone()),
                s.occurrence_count,
            )
        })
        .collect();
    (stats, subs)
}

fn apply(batches: &[Batch]) -> MemoryState {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let store = MemoryStore::new();
    let aggregator = PhonemeAggregator::new(Arc::new(store.clone()));
    let user = UserId("prop".into());
    rt.block_on(async {
        for (outcomes, subs) in batches {
            aggregator.record_analysis(&user, outcomes, subs).await.unwrap();
        }
    });
    store.snapshot()
}

proptest! {
    #[test]
    fn batches_commute(batches in prop::collection::vec(batch(), 1..6)) {
        let forward = apply(&batches);
        let mut reversed_batches = batches.clone();
        reversed_batches.reverse();
        let reversed = apply(&reversed_batches);

        prop_assert_eq!(counters(&forward), counters(&reversed));

        let expected_attempts: usize = batches.iter().map(|(o, _)| o.len()).sum();
        let recorded: i64 = forward.phoneme_stats.values().map(|s| s.total_attempts).sum();
        prop_assert_eq!(recorded, expected_attempts as i64);
        for s in forward.phoneme_stats.values() {
            prop_assert!(s.correct_count + s.deletion_count <= s.total_attempts);
        }
    }
}
