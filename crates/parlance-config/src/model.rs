// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parlance pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Parlance configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParlanceConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Audio blob store settings.
    #[serde(default)]
    pub blob: BlobConfig,

    /// Speech-to-text service settings.
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Pronunciation analysis service settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Background worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Credit pricing and allowances.
    #[serde(default)]
    pub credits: CreditsConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name shown in logs and `doctor` output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "parlance".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parlance").join("parlance.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parlance.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Local directory blob store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobConfig {
    /// Directory audio files are written under.
    #[serde(default = "default_blob_root")]
    pub root_dir: String,

    /// Base URL the speech services reach the blob directory through.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// HMAC key for presigned URLs. Required to serve audio.
    #[serde(default)]
    pub signing_key: Option<String>,

    /// Lifetime of presigned URLs in seconds.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root_dir: default_blob_root(),
            public_base_url: default_public_base_url(),
            signing_key: None,
            presign_ttl_secs: default_presign_ttl_secs(),
        }
    }
}

impl BlobConfig {
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

fn default_blob_root() -> String {
    dirs::data_dir()
        .map(|p| p.join("parlance").join("audio"))
        .unwrap_or_else(|| std::path::PathBuf::from("audio"))
        .to_string_lossy()
        .into_owned()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080/audio".to_string()
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

/// Transcription service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionConfig {
    /// Base URL of the speech service.
    #[serde(default = "default_ml_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_ml_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient HTTP statuses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Language hint. `None` lets the service detect it.
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_ml_base_url(),
            timeout_secs: default_ml_timeout_secs(),
            max_retries: default_max_retries(),
            language: None,
        }
    }
}

/// Pronunciation analysis service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Base URL of the speech service.
    #[serde(default = "default_ml_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_ml_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient HTTP statuses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Language/accent the phrase is scored against.
    #[serde(default = "default_analysis_language")]
    pub language: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_ml_base_url(),
            timeout_secs: default_ml_timeout_secs(),
            max_retries: default_max_retries(),
            language: default_analysis_language(),
        }
    }
}

fn default_ml_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ml_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

fn default_analysis_language() -> String {
    "en-us".to_string()
}

/// Background worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of jobs processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Jobs that may wait in the queue before intake blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Deadline for one job (presign, transcribe, analyze) in seconds.
    #[serde(default = "default_job_deadline_secs")]
    pub job_deadline_secs: u64,

    /// How long shutdown waits for queued jobs to drain.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            job_deadline_secs: default_job_deadline_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_job_deadline_secs() -> u64 {
    300
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Credit pricing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreditsConfig {
    /// Credits charged for a text turn.
    #[serde(default = "default_text_turn_cost")]
    pub text_turn_cost: i64,

    /// Credits charged for an audio turn (reply plus analysis).
    #[serde(default = "default_audio_turn_cost")]
    pub audio_turn_cost: i64,

    /// Monthly allowance given to newly initialized users.
    #[serde(default = "default_allowance")]
    pub default_allowance: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            text_turn_cost: default_text_turn_cost(),
            audio_turn_cost: default_audio_turn_cost(),
            default_allowance: default_allowance(),
        }
    }
}

fn default_text_turn_cost() -> i64 {
    1
}

fn default_audio_turn_cost() -> i64 {
    5
}

fn default_allowance() -> i64 {
    100
}
