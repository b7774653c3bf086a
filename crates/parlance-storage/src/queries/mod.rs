// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the storage entities.
//!
//! Functions are synchronous and take a `rusqlite::Connection` (or a
//! transaction, which derefs to one). They run on tokio-rusqlite's
//! background thread via [`SqliteScope`](crate::scope::SqliteScope).

pub mod credits;
pub mod messages;
pub mod phoneme_stats;
pub mod threads;

/// Wraps a column parse failure as a rusqlite conversion error.
pub(crate) fn text_conversion_err<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

/// In-memory connection with the full schema applied.
#[cfg(test)]
pub(crate) fn test_connection() -> rusqlite::Connection {
    let mut conn = rusqlite::Connection::open_in_memory().expect("open in-memory db");
    conn.pragma_update(None, "foreign_keys", true)
        .expect("enable foreign keys");
    crate::migrations::run_migrations(&mut conn).expect("migrations");
    conn
}
