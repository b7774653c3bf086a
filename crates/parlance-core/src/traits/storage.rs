// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of a persistence backend.
///
/// Data access goes through [`UnitOfWork`](crate::traits::scope::UnitOfWork);
/// this trait only opens and closes the backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ParlanceError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ParlanceError>;
}
