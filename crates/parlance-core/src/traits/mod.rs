// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the Parlance backends.
//!
//! Remote and storage adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility. Repository traits are
//! synchronous and grouped into a [`Scope`].

pub mod adapter;
pub mod blob;
pub mod repository;
pub mod scope;
pub mod speech;
pub mod storage;

pub use adapter::PluginAdapter;
pub use blob::BlobStore;
pub use repository::{
    CreditRepo, MessageRepo, PhonemeDelta, PhonemeStatsRepo, PronunciationCompletion, ThreadRepo,
};
pub use scope::{Scope, UnitOfWork, Work, work};
pub use speech::{PronunciationAnalyzer, Transcriber};
pub use storage::StorageAdapter;
