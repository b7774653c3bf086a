// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters for the external collaborators of the pronunciation pipeline.
//!
//! This crate implements [`Transcriber`](parlance_core::Transcriber) and
//! [`PronunciationAnalyzer`](parlance_core::PronunciationAnalyzer) over the
//! speech service's HTTP API, and [`BlobStore`](parlance_core::BlobStore)
//! over a local directory with signed URLs.

pub mod analysis;
pub mod blob;
pub mod client;
pub mod transcription;
pub mod types;

pub use analysis::MlAnalyzer;
pub use blob::FsBlobStore;
pub use client::SpeechClient;
pub use transcription::MlTranscriber;
