// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance doctor` command implementation.
//!
//! Runs diagnostic checks against the configured database, blob directory
//! and speech services.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use parlance_config::ParlanceConfig;
use parlance_core::{HealthStatus, ParlanceError, PluginAdapter};
use parlance_speech::{FsBlobStore, MlAnalyzer, MlTranscriber};
use parlance_storage::SqliteStorage;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }

    fn from_health(
        name: &str,
        health: Result<HealthStatus, ParlanceError>,
        start: Instant,
    ) -> Self {
        match health {
            Ok(HealthStatus::Healthy) => Self::new(name, CheckStatus::Pass, "healthy", start),
            Ok(HealthStatus::Degraded(reason)) => Self::new(name, CheckStatus::Warn, reason, start),
            Ok(HealthStatus::Unhealthy(reason)) => Self::new(name, CheckStatus::Fail, reason, start),
            Err(e) => Self::new(name, CheckStatus::Fail, e.to_string(), start),
        }
    }
}

/// Run the `parlance doctor` command.
///
/// With `deep`, also checks database integrity, the pending backlog and
/// allocator usage. With `plain`, disables colored output.
pub async fn run_doctor(
    config: &ParlanceConfig,
    deep: bool,
    plain: bool,
) -> Result<(), ParlanceError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = vec![check_config(config)];

    let storage = match open_existing(config).await {
        Ok(storage) => {
            results.push(check_database(&storage).await);
            Some(storage)
        }
        Err(result) => {
            results.push(result);
            None
        }
    };
    results.push(check_blob_store(config).await);
    results.push(check_transcription(config).await);
    results.push(check_analysis(config).await);

    if deep {
        if let Some(storage) = &storage {
            results.push(check_db_integrity(storage).await);
            results.push(check_pending_backlog(storage).await);
        }
        results.push(check_memory_baseline());
    }

    println!();
    println!("  parlance doctor ({})", config.service.name);
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{}", format_line(result, use_color));
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    if let Some(storage) = storage {
        storage.shutdown().await?;
    }
    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<20} {} ({duration_ms}ms)", result.name, result.message)
    }
}

/// The configuration already loaded and validated; flag settings that
/// leave parts of the pipeline unusable.
fn check_config(config: &ParlanceConfig) -> CheckResult {
    let start = Instant::now();
    if config.blob.signing_key.is_none() {
        return CheckResult::new(
            "Configuration",
            CheckStatus::Warn,
            "blob.signing_key not set; audio cannot be presigned",
            start,
        );
    }
    CheckResult::new("Configuration", CheckStatus::Pass, "valid", start)
}

/// Opens the database only if it already exists, so `doctor` never
/// creates one.
async fn open_existing(config: &ParlanceConfig) -> Result<SqliteStorage, CheckResult> {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if !std::path::Path::new(path).exists() {
        return Err(CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {path} (created on first use)"),
            start,
        ));
    }
    SqliteStorage::open(config.storage.clone()).await.map_err(|e| {
        CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start)
    })
}

async fn check_database(storage: &SqliteStorage) -> CheckResult {
    let start = Instant::now();
    match storage.status_counts().await {
        Ok(counts) => {
            let total: i64 = counts.iter().map(|(_, n)| n).sum();
            CheckResult::new(
                "Database",
                CheckStatus::Pass,
                format!("connected, {total} message(s)"),
                start,
            )
        }
        Err(e) => {
            CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start)
        }
    }
}

async fn check_blob_store(config: &ParlanceConfig) -> CheckResult {
    let start = Instant::now();
    let blobs = FsBlobStore::new(&config.blob);
    CheckResult::from_health("Blob store", blobs.health_check().await, start)
}

async fn check_transcription(config: &ParlanceConfig) -> CheckResult {
    let start = Instant::now();
    let health = match MlTranscriber::new(&config.transcription) {
        Ok(client) => client.health_check().await,
        Err(e) => Err(e),
    };
    CheckResult::from_health("Transcription", health, start)
}

async fn check_analysis(config: &ParlanceConfig) -> CheckResult {
    let start = Instant::now();
    let health = match MlAnalyzer::new(&config.analysis) {
        Ok(client) => client.health_check().await,
        Err(e) => Err(e),
    };
    CheckResult::from_health("Analysis", health, start)
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(storage: &SqliteStorage) -> CheckResult {
    let start = Instant::now();
    match storage.integrity_check().await {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => {
            CheckResult::new("DB integrity", CheckStatus::Fail, format!("check failed: {e}"), start)
        }
    }
}

/// Deep check: messages left `pending` by interrupted runs.
async fn check_pending_backlog(storage: &SqliteStorage) -> CheckResult {
    let start = Instant::now();
    match storage.status_counts().await {
        Ok(counts) => {
            let pending = counts
                .iter()
                .find(|(status, _)| status == "pending")
                .map_or(0, |(_, n)| *n);
            if pending == 0 {
                CheckResult::new("Pending backlog", CheckStatus::Pass, "none", start)
            } else {
                CheckResult::new(
                    "Pending backlog",
                    CheckStatus::Warn,
                    format!("{pending} message(s) still pending"),
                    start,
                )
            }
        }
        Err(e) => CheckResult::new("Pending backlog", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Deep check: memory baseline via jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}
