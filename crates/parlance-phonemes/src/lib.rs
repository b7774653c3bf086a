// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulate-only phoneme statistics.
//!
//! Analyses are folded into per-user counters with upsert-increment
//! statements, so concurrent analyses for the same user commute.

pub mod aggregator;
pub mod report;

pub use aggregator::{PhonemeAggregator, Tally, record_in};
pub use report::PhonemeReport;
