// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, ledger, speech and worker crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random (UUID v4) identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of an authenticated user (owned by the auth collaborator).
    UserId
);
string_id!(
    /// Identifier of a conversation thread.
    ThreadId
);
string_id!(
    /// Identifier of a single message.
    MessageId
);

/// Current UTC time as an ISO 8601 string with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    BlobStore,
    Transcription,
    Analysis,
}

// --- Conversation ---

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Pronunciation analysis progress of a message.
///
/// `none → pending → complete | failed`. Both terminal states are final.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PronunciationStatus {
    /// Text message, or audio never queued for analysis.
    None,
    /// Accepted and waiting for (or in) analysis.
    Pending,
    /// Analysis stored.
    Complete,
    /// Analysis attempted and failed.
    Failed,
}

impl PronunciationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: PronunciationStatus) -> bool {
        matches!(
            (self, next),
            (Self::None, Self::Pending)
                | (Self::Pending, Self::Complete)
                | (Self::Pending, Self::Failed)
        )
    }
}

/// A conversation thread owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: String,
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub role: Role,
    /// Transcript text; empty until transcription for audio turns.
    pub content: String,
    /// Blob store reference, only for user audio turns.
    pub audio_ref: Option<String>,
    pub audio_duration_secs: Option<f64>,
    pub pronunciation_status: PronunciationStatus,
    /// Analysis payload as stored (JSON), only when complete.
    pub pronunciation_result: Option<serde_json::Value>,
    /// `"<CODE>: <message>"`, only when failed.
    pub pronunciation_error: Option<String>,
    pub pronunciation_updated_at: Option<String>,
    pub created_at: String,
}

impl Message {
    /// A fresh user audio turn with status `none` and no transcript yet.
    pub fn user_audio(id: MessageId, thread_id: ThreadId, audio_ref: String) -> Self {
        Self {
            id,
            thread_id,
            role: Role::User,
            content: String::new(),
            audio_ref: Some(audio_ref),
            audio_duration_secs: None,
            pronunciation_status: PronunciationStatus::None,
            pronunciation_result: None,
            pronunciation_error: None,
            pronunciation_updated_at: None,
            created_at: now_timestamp(),
        }
    }

    /// A text turn; never analyzed.
    pub fn text(thread_id: ThreadId, role: Role, content: String) -> Self {
        Self {
            id: MessageId::generate(),
            thread_id,
            role,
            content,
            audio_ref: None,
            audio_duration_secs: None,
            pronunciation_status: PronunciationStatus::None,
            pronunciation_result: None,
            pronunciation_error: None,
            pronunciation_updated_at: None,
            created_at: now_timestamp(),
        }
    }
}

// --- Credits ---

/// Per-user prepaid credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credits {
    pub user_id: UserId,
    /// Never negative.
    pub balance: i64,
    pub monthly_allowance: i64,
    pub used_this_period: i64,
    pub last_refreshed_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Why a credit transaction was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Opening balance when the credits row is created.
    Grant,
    /// Spend.
    Debit,
    /// Top-up from a purchase.
    Credit,
    /// Monthly reset to the allowance.
    Refresh,
}

/// Immutable audit record of a balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Signed; negative for spend.
    pub amount: i64,
    pub balance_after: i64,
    /// What triggered the change (message id, subscription id, ...).
    pub reference: Option<String>,
    pub reason: String,
    pub created_at: String,
}

impl CreditTransaction {
    pub fn new(
        user_id: UserId,
        kind: TransactionKind,
        amount: i64,
        balance_after: i64,
        reference: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            kind,
            amount,
            balance_after,
            reference,
            reason: reason.into(),
            created_at: now_timestamp(),
        }
    }
}

// --- Phoneme statistics ---

/// Accumulated counters for one (user, phoneme).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeStats {
    pub user_id: UserId,
    /// IPA symbol.
    pub phoneme: String,
    pub total_attempts: i64,
    pub correct_count: i64,
    pub deletion_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PhonemeStats {
    /// Accuracy as a percentage (0-100); zero when never attempted.
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.correct_count as f64 / self.total_attempts as f64 * 100.0
    }
}

/// Accumulated count of one (user, expected, actual) substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeSubstitution {
    pub user_id: UserId,
    pub expected_phoneme: String,
    pub actual_phoneme: String,
    pub occurrence_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

// --- Blobs ---

/// A stored payload with the content type it was uploaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

// --- Speech services ---

/// Word-level timing returned by transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    #[serde(rename = "start")]
    pub start_secs: f64,
    #[serde(rename = "end")]
    pub end_secs: f64,
}

/// Result of a transcription call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
    pub words: Vec<WordTiming>,
}

/// Request for a pronunciation analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub audio_url: String,
    pub expected_text: String,
    pub language: String,
}

/// How one aligned phoneme compared against the expected phoneme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentKind {
    Match,
    Substitute,
    Delete,
    Insert,
    #[serde(other)]
    Unknown,
}

/// One entry of the phoneme alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeDetail {
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub actual: String,
    #[serde(rename = "type")]
    pub kind: AlignmentKind,
    #[serde(default)]
    pub position: i64,
}

/// Audio quality metrics reported alongside an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioQuality {
    pub quality_score: f64,
    pub snr_db: f64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Structured pronunciation analysis, stored verbatim on the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationAnalysis {
    pub audio_ipa: String,
    pub expected_ipa: String,
    pub phoneme_count: i64,
    pub match_count: i64,
    pub substitution_count: i64,
    pub deletion_count: i64,
    pub insertion_count: i64,
    #[serde(default)]
    pub phoneme_details: Vec<PhonemeDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_quality: Option<AudioQuality>,
    #[serde(default)]
    pub processing_time_ms: i64,
}

/// Per-phoneme outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeOutcome {
    pub phoneme: String,
    pub correct: bool,
    pub deleted: bool,
}

/// The speaker produced `actual` where `expected` was wanted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstitutionEvent {
    pub expected_phoneme: String,
    pub actual_phoneme: String,
}

impl PronunciationAnalysis {
    /// Outcomes for every expected phoneme. Insertions and entries without an
    /// expected phoneme are not attempts and are skipped.
    pub fn outcomes(&self) -> Vec<PhonemeOutcome> {
        self.phoneme_details
            .iter()
            .filter(|d| d.kind != AlignmentKind::Insert && !d.expected.is_empty())
            .map(|d| PhonemeOutcome {
                phoneme: d.expected.clone(),
                correct: d.kind == AlignmentKind::Match,
                deleted: d.kind == AlignmentKind::Delete,
            })
            .collect()
    }

    pub fn substitution_events(&self) -> Vec<SubstitutionEvent> {
        self.phoneme_details
            .iter()
            .filter(|d| {
                d.kind == AlignmentKind::Substitute
                    && !d.expected.is_empty()
                    && !d.actual.is_empty()
            })
            .map(|d| SubstitutionEvent {
                expected_phoneme: d.expected.clone(),
                actual_phoneme: d.actual.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn detail(expected: &str, actual: &str, kind: AlignmentKind) -> PhonemeDetail {
        PhonemeDetail {
            expected: expected.into(),
            actual: actual.into(),
            kind,
            position: 0,
        }
    }

    fn analysis(details: Vec<PhonemeDetail>) -> PronunciationAnalysis {
        PronunciationAnalysis {
            audio_ipa: String::new(),
            expected_ipa: String::new(),
            phoneme_count: details.len() as i64,
            match_count: 0,
            substitution_count: 0,
            deletion_count: 0,
            insertion_count: 0,
            phoneme_details: details,
            audio_quality: None,
            processing_time_ms: 0,
        }
    }

    #[test]
    fn status_parses_and_displays_lowercase() {
        assert_eq!(PronunciationStatus::Pending.to_string(), "pending");
        assert_eq!(
            PronunciationStatus::from_str("complete").unwrap(),
            PronunciationStatus::Complete
        );
        assert!(PronunciationStatus::from_str("Complete").is_err());
    }

    #[test]
    fn terminal_states_allow_no_transitions() {
        use PronunciationStatus::*;
        for from in [Complete, Failed] {
            assert!(from.is_terminal());
            for to in [None, Pending, Complete, Failed] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(None.can_transition_to(Pending));
        assert!(!None.can_transition_to(Complete));
        assert!(Pending.can_transition_to(Failed));
    }

    #[test]
    fn outcomes_skip_insertions_and_blank_expected() {
        let a = analysis(vec![
            detail("θ", "θ", AlignmentKind::Match),
            detail("ɪ", "i", AlignmentKind::Substitute),
            detail("r", "", AlignmentKind::Delete),
            detail("", "ə", AlignmentKind::Insert),
            detail("", "x", AlignmentKind::Substitute),
        ]);
        let outcomes = a.outcomes();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].correct);
        assert!(!outcomes[1].correct && !outcomes[1].deleted);
        assert!(outcomes[2].deleted);

        let subs = a.substitution_events();
        assert_eq!(
            subs,
            vec![SubstitutionEvent {
                expected_phoneme: "ɪ".into(),
                actual_phoneme: "i".into()
            }]
        );
    }

    #[test]
    fn analysis_parses_wire_format() {
        let json = serde_json::json!({
            "audio_ipa": "θɪŋk",
            "expected_ipa": "θɪŋk",
            "phoneme_count": 2,
            "match_count": 1,
            "substitution_count": 1,
            "deletion_count": 0,
            "insertion_count": 0,
            "phoneme_details": [
                {"expected": "θ", "actual": "θ", "type": "match", "position": 0},
                {"expected": "ɪ", "actual": "i", "type": "substitute", "position": 1},
                {"expected": "ŋ", "actual": "", "type": "mystery", "position": 2}
            ],
            "processing_time_ms": 1200
        });
        let parsed: PronunciationAnalysis = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.phoneme_details[1].kind, AlignmentKind::Substitute);
        assert_eq!(parsed.phoneme_details[2].kind, AlignmentKind::Unknown);
        assert!(parsed.audio_quality.is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
        assert_eq!(UserId::from("u-1").to_string(), "u-1");
    }

    #[test]
    fn accuracy_handles_zero_attempts() {
        let mut stats = PhonemeStats {
            user_id: "u".into(),
            phoneme: "θ".into(),
            total_attempts: 0,
            correct_count: 0,
            deletion_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(stats.accuracy(), 0.0);
        stats.total_attempts = 4;
        stats.correct_count = 3;
        assert!((stats.accuracy() - 75.0).abs() < 1e-9);
    }
}
