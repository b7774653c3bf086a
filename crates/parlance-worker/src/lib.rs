// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn intake and background pronunciation analysis.
//!
//! - [`Intake`] charges a turn, stores the audio and persists a `pending`
//!   message before queueing its job.
//! - [`WorkerPool`] runs [`PronunciationWorker`]s that presign, transcribe,
//!   analyze and record each job, moving the message to `complete` or
//!   `failed`.
//! - [`install_signal_handler`] turns SIGTERM/SIGINT into a cancellation
//!   that drains the pool.

pub mod intake;
pub mod pool;
pub mod shutdown;
pub mod worker;

pub use intake::{AcceptedTurn, AudioSubmission, Intake};
pub use pool::{JobQueue, PoolSettings, ShutdownReport, WorkerPool};
pub use shutdown::install_signal_handler;
pub use worker::{
    JobOutcome, PronunciationJob, PronunciationWorker, SpeechServices, WorkerSettings,
};
