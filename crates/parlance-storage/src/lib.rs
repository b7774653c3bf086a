// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Parlance pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the repository traits from
//! `parlance-core` implemented over a borrowed connection or transaction.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod scope;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use scope::SqliteScope;
