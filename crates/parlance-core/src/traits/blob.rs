// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store trait for uploaded audio.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::types::StoredBlob;
use crate::traits::adapter::PluginAdapter;

/// Stores opaque audio payloads and hands out time-limited URLs for them.
///
/// References returned by [`put`](BlobStore::put) are opaque to callers and
/// are what gets persisted on the message row.
#[async_trait]
pub trait BlobStore: PluginAdapter {
    /// Stores `bytes` and returns a reference. `key_hint` is a path-like
    /// suggestion (`user/{thread}/{message}.webm`); stores may ignore it.
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        key_hint: &str,
    ) -> Result<String, ParlanceError>;

    /// Reads a stored payload back with the content type given to `put`.
    async fn get(&self, reference: &str) -> Result<StoredBlob, ParlanceError>;

    /// Returns a URL the speech services can fetch the payload from until `ttl` elapses.
    async fn presigned_url(&self, reference: &str, ttl: Duration)
    -> Result<String, ParlanceError>;

    /// Removes a payload. Deleting a missing reference is not an error.
    async fn delete(&self, reference: &str) -> Result<(), ParlanceError>;
}
