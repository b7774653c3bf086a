// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monthly usage period boundaries.
//!
//! A period is a UTC calendar month. Credits refresh when the last refresh
//! happened in an earlier month than `now`.

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

/// Whether a refresh is due for a row last refreshed at `last_refreshed_at`.
///
/// Unparseable timestamps count as due so a corrupt row self-heals on the
/// next refresh.
pub fn refresh_due(last_refreshed_at: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(last_refreshed_at) {
        Ok(last) => {
            let last = last.with_timezone(&Utc);
            (last.year(), last.month()) < (now.year(), now.month())
        }
        Err(e) => {
            warn!(last_refreshed_at, error = %e, "unparseable refresh timestamp");
            true
        }
    }
}
