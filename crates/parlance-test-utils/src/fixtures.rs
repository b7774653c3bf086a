// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned domain values for tests.

use parlance_core::types::{
    AlignmentKind, AudioQuality, PhonemeDetail, PronunciationAnalysis, Thread, ThreadId, UserId,
    now_timestamp,
};

/// A thread owned by `user`.
pub fn thread_for(user: &UserId, id: &str) -> Thread {
    Thread {
        id: ThreadId(id.to_string()),
        user_id: user.clone(),
        name: "practice".to_string(),
        created_at: now_timestamp(),
    }
}

/// Builds an analysis from `(expected, actual, kind)` alignment entries,
/// with counts derived from the entries.
pub fn analysis_from(details: &[(&str, &str, AlignmentKind)]) -> PronunciationAnalysis {
    let count = |kind: AlignmentKind| details.iter().filter(|d| d.2 == kind).count() as i64;
    PronunciationAnalysis {
        audio_ipa: details.iter().map(|d| d.1).collect(),
        expected_ipa: details.iter().map(|d| d.0).collect(),
        phoneme_count: details
            .iter()
            .filter(|d| d.2 != AlignmentKind::Insert)
            .count() as i64,
        match_count: count(AlignmentKind::Match),
        substitution_count: count(AlignmentKind::Substitute),
        deletion_count: count(AlignmentKind::Delete),
        insertion_count: count(AlignmentKind::Insert),
        phoneme_details: details
            .iter()
            .enumerate()
            .map(|(i, (expected, actual, kind))| PhonemeDetail {
                expected: expected.to_string(),
                actual: actual.to_string(),
                kind: *kind,
                position: i as i64,
            })
            .collect(),
        audio_quality: Some(AudioQuality {
            quality_score: 0.9,
            snr_db: 24.0,
            duration_seconds: 1.2,
            warnings: Vec::new(),
        }),
        processing_time_ms: 850,
    }
}

/// "think" read as "fink"-ish: one match, one substitution, one deletion,
/// one insertion.
pub fn sample_analysis() -> PronunciationAnalysis {
    analysis_from(&[
        ("θ", "θ", AlignmentKind::Match),
        ("ɪ", "i", AlignmentKind::Substitute),
        ("ŋ", "", AlignmentKind::Delete),
        ("", "ə", AlignmentKind::Insert),
        ("k", "k", AlignmentKind::Match),
    ])
}
