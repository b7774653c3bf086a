// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parlance pronunciation pipeline.
//!
//! This crate provides the trait definitions, error type, and common types
//! used throughout the Parlance workspace. Storage backends, speech clients
//! and test doubles all implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ParlanceError, ServiceKind};
pub use types::{AdapterType, HealthStatus, MessageId, ThreadId, UserId};

pub use traits::{
    BlobStore, CreditRepo, MessageRepo, PhonemeDelta, PhonemeStatsRepo, PluginAdapter,
    PronunciationAnalyzer, PronunciationCompletion, Scope, StorageAdapter, ThreadRepo,
    Transcriber, UnitOfWork, Work, work,
};
