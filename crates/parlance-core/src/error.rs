// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parlance pronunciation pipeline.

use thiserror::Error;

use crate::types::PronunciationStatus;

/// The external collaborator a [`ParlanceError::ExternalService`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ServiceKind {
    BlobStore,
    Transcription,
    Analysis,
}

/// The primary error type used across all Parlance traits and services.
#[derive(Debug, Error)]
pub enum ParlanceError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, commit failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The user's balance does not cover the requested charge.
    #[error("insufficient credits for user {user_id}: required {required}, available {available}")]
    InsufficientCredits {
        user_id: String,
        required: i64,
        available: i64,
    },

    /// A user, thread, message or credits row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A blob store, transcription or analysis call failed.
    #[error("{service} error ({code}): {message}")]
    ExternalService {
        service: ServiceKind,
        code: String,
        message: String,
        retryable: bool,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A guarded pronunciation status update matched no row.
    #[error("message {message_id} cannot move from {from} to {to}")]
    InvalidTransition {
        message_id: String,
        from: PronunciationStatus,
        to: PronunciationStatus,
    },

    /// A credit amount that must be positive was zero or negative.
    #[error("invalid credit amount: {0}")]
    InvalidAmount(i64),

    /// A credits balance disagrees with the sum of its transactions.
    #[error("ledger drift for user {user_id}: balance {balance}, transaction sum {transaction_sum}")]
    LedgerDrift {
        user_id: String,
        balance: i64,
        transaction_sum: i64,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParlanceError {
    /// Shorthand for an [`ExternalService`](Self::ExternalService) error without a source.
    pub fn external(service: ServiceKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            code: code.into(),
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Shorthand for a [`NotFound`](Self::NotFound) error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the worker converts this error into a `failed` transition.
    ///
    /// External service failures and deadline expiry are recoverable; storage
    /// and logic errors are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExternalService { .. } | Self::Timeout { .. })
    }

    /// Stable code recorded alongside a failure reason.
    pub fn failure_code(&self) -> &str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ExternalService { code, .. } => code,
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::LedgerDrift { .. } => "LEDGER_DRIFT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Human-readable reason stored in `pronunciation_error`: `"<CODE>: <message>"`.
    pub fn failure_reason(&self) -> String {
        match self {
            Self::ExternalService { code, message, .. } => format!("{code}: {message}"),
            other => format!("{}: {other}", other.failure_code()),
        }
    }
}
