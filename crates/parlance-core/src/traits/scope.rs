// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional scope abstraction.
//!
//! Services never touch a connection directly. They hand a closure to a
//! [`UnitOfWork`], which runs it against a [`Scope`] bound either to the
//! ambient connection or to a fresh transaction. Transactions commit when
//! the closure returns `Ok` and roll back when it returns `Err`.

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::traits::repository::{CreditRepo, MessageRepo, PhonemeStatsRepo, ThreadRepo};

/// Every repository, bound to one connection or transaction.
pub trait Scope: CreditRepo + MessageRepo + ThreadRepo + PhonemeStatsRepo {}

impl<T> Scope for T where T: CreditRepo + MessageRepo + ThreadRepo + PhonemeStatsRepo {}

/// A unit of storage work.
pub type Work<R> = Box<dyn FnOnce(&mut dyn Scope) -> Result<R, ParlanceError> + Send>;

/// Boxes a closure as [`Work`], fixing the closure's argument type.
pub fn work<R, F>(f: F) -> Work<R>
where
    F: FnOnce(&mut dyn Scope) -> Result<R, ParlanceError> + Send + 'static,
{
    Box::new(f)
}

/// Runs [`Work`] against a storage backend.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    /// Runs `work` on the ambient connection. Each statement commits on its own.
    async fn ambient<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError>;

    /// Runs `work` inside one write transaction. Concurrent transactions
    /// are serialized.
    async fn transaction<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError>;
}
