// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parlance tests.
//!
//! Provides an in-memory store and mock adapters for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MemoryStore`] - In-memory `UnitOfWork` with rollback and call recording
//! - [`MockBlobStore`], [`MockTranscriber`], [`MockAnalyzer`] - Scripted speech backends
//! - [`fixtures`] - Canned threads and analyses

pub mod fixtures;
pub mod memory_store;
pub mod mock_speech;

pub use memory_store::{MemoryState, MemoryStore};
pub use mock_speech::{MockAnalyzer, MockBlobStore, MockTranscriber, Reply};
