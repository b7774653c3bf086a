// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local directory blob store with signed, expiring URLs.
//!
//! References are relative keys under the root directory. Presigned URLs
//! have the form `{public_base_url}/{key}?expires={unix}&signature={hex}`,
//! where the signature is HMAC-SHA256 over `"{key}\n{expires}"`. Whatever
//! serves the directory checks them with [`FsBlobStore::verify_presigned`].
//!
//! Each blob's content type is kept in a `{key}.content-type` file beside it.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use parlance_config::model::BlobConfig;
use parlance_core::types::{AdapterType, HealthStatus, StoredBlob};
use parlance_core::{BlobStore, ParlanceError, PluginAdapter, ServiceKind};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const CONTENT_TYPE_SUFFIX: &str = ".content-type";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn content_type_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(CONTENT_TYPE_SUFFIX);
    PathBuf::from(name)
}

/// [`BlobStore`] over a local directory.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
    signing_key: Option<Vec<u8>>,
}

impl FsBlobStore {
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_key: config.signing_key.as_ref().map(|k| k.as_bytes().to_vec()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a reference to a path inside the root, rejecting anything
    /// that could escape it.
    fn path_for(&self, reference: &str) -> Result<PathBuf, ParlanceError> {
        let relative = Path::new(reference);
        let clean = !reference.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(blob_error(
                "INVALID_BLOB_KEY",
                format!("invalid blob reference: {reference:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn mac(&self, key: &[u8], reference: &str, expires: i64) -> Result<HmacSha256, ParlanceError> {
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| ParlanceError::Config(format!("invalid blob signing key: {e}")))?;
        mac.update(reference.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Checks a presigned URL's parameters at unix time `now`.
    ///
    /// False when no signing key is configured, the URL has expired, or the
    /// signature does not match.
    pub fn verify_presigned(&self, reference: &str, expires: i64, signature: &str, now: i64) -> bool {
        let Some(key) = self.signing_key.as_deref() else {
            return false;
        };
        if now > expires {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        match self.mac(key, reference, expires) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

fn blob_error(code: &str, message: impl Into<String>) -> ParlanceError {
    ParlanceError::external(ServiceKind::BlobStore, code, message)
}

fn io_error(code: &str, context: &str, e: std::io::Error) -> ParlanceError {
    ParlanceError::ExternalService {
        service: ServiceKind::BlobStore,
        code: code.to_string(),
        message: format!("{context}: {e}"),
        retryable: false,
        source: Some(Box::new(e)),
    }
}

/// Turns a path-like hint into a safe relative key; falls back to a fresh
/// UUID when nothing usable remains.
fn key_from_hint(hint: &str) -> String {
    let segments: Vec<String> = hint
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();
    if segments.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        segments.join("/")
    }
}

#[async_trait]
impl PluginAdapter for FsBlobStore {
    fn name(&self) -> &str {
        "fs-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BlobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, ParlanceError> {
        if self.signing_key.is_none() {
            return Ok(HealthStatus::Degraded(
                "no signing key; presigned URLs unavailable".into(),
            ));
        }
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "{}: {e}",
                self.root.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ParlanceError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        key_hint: &str,
    ) -> Result<String, ParlanceError> {
        let reference = key_from_hint(key_hint);
        let path = self.path_for(&reference)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("BLOB_WRITE_ERROR", "failed to create blob directory", e))?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error("BLOB_WRITE_ERROR", "failed to write blob", e))?;
        tokio::fs::write(content_type_path(&path), content_type)
            .await
            .map_err(|e| io_error("BLOB_WRITE_ERROR", "failed to write content type", e))?;
        debug!(reference, size, content_type, "blob stored");
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> Result<StoredBlob, ParlanceError> {
        let path = self.path_for(reference)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ParlanceError::not_found("blob", reference));
            }
            Err(e) => return Err(io_error("BLOB_READ_ERROR", "failed to read blob", e)),
        };
        let content_type = match tokio::fs::read_to_string(content_type_path(&path)).await {
            Ok(content_type) => content_type,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(io_error("BLOB_READ_ERROR", "failed to read content type", e)),
        };
        Ok(StoredBlob {
            bytes,
            content_type,
        })
    }

    async fn presigned_url(&self, reference: &str, ttl: Duration) -> Result<String, ParlanceError> {
        let key = self.signing_key.as_deref().ok_or_else(|| {
            blob_error("PRESIGNED_URL_ERROR", "blob signing key is not configured")
        })?;
        let path = self.path_for(reference)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(blob_error(
                "PRESIGNED_URL_ERROR",
                format!("blob not found: {reference}"),
            ));
        }

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        let signature = hex::encode(self.mac(key, reference, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/{}?expires={expires}&signature={signature}",
            self.public_base_url, reference
        ))
    }

    async fn delete(&self, reference: &str) -> Result<(), ParlanceError> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(content_type_path(&path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("BLOB_DELETE_ERROR", "failed to delete content type", e)),
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(reference, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(reference, "blob already gone");
                Ok(())
            }
            Err(e) => Err(io_error("BLOB_DELETE_ERROR", "failed to delete blob", e)),
        }
    }
}
