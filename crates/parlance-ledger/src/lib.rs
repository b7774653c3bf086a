// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prepaid credit accounting for Parlance.
//!
//! This crate provides:
//! - **Credit ledger**: balance changes paired with an append-only transaction log
//! - **Pricing**: per-turn credit costs from configuration
//! - **Periods**: calendar-month refresh of the monthly allowance

pub mod ledger;
pub mod period;
pub mod pricing;

pub use ledger::{CreditLedger, debit};
pub use pricing::{CostSchedule, TurnKind};
