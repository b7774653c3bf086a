// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive pool sizes, parseable URLs, and non-negative prices.

use crate::diagnostic::ConfigError;
use crate::model::ParlanceConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Minimum signing key length in bytes.
const MIN_SIGNING_KEY_LEN: usize = 32;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParlanceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.blob.root_dir.trim().is_empty() {
        errors.push(ConfigError::invalid("blob.root_dir", "must not be empty"));
    }

    check_http_url(&mut errors, "blob.public_base_url", &config.blob.public_base_url);

    if let Some(key) = &config.blob.signing_key
        && key.len() < MIN_SIGNING_KEY_LEN
    {
        errors.push(ConfigError::invalid(
            "blob.signing_key",
            format!("must be at least {MIN_SIGNING_KEY_LEN} bytes, got {}", key.len()),
        ));
    }

    if config.blob.presign_ttl_secs == 0 {
        errors.push(ConfigError::invalid("blob.presign_ttl_secs", "must be positive"));
    }

    check_http_url(
        &mut errors,
        "transcription.base_url",
        &config.transcription.base_url,
    );
    if config.transcription.timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "transcription.timeout_secs",
            "must be positive",
        ));
    }

    check_http_url(&mut errors, "analysis.base_url", &config.analysis.base_url);
    if config.analysis.timeout_secs == 0 {
        errors.push(ConfigError::invalid("analysis.timeout_secs", "must be positive"));
    }
    if config.analysis.language.trim().is_empty() {
        errors.push(ConfigError::invalid("analysis.language", "must not be empty"));
    }

    if config.worker.concurrency == 0 {
        errors.push(ConfigError::invalid("worker.concurrency", "must be at least 1"));
    }
    if config.worker.queue_capacity == 0 {
        errors.push(ConfigError::invalid(
            "worker.queue_capacity",
            "must be at least 1",
        ));
    }
    if config.worker.job_deadline_secs == 0 {
        errors.push(ConfigError::invalid(
            "worker.job_deadline_secs",
            "must be positive",
        ));
    }

    for (key, value) in [
        ("credits.text_turn_cost", config.credits.text_turn_cost),
        ("credits.audio_turn_cost", config.credits.audio_turn_cost),
        ("credits.default_allowance", config.credits.default_allowance),
    ] {
        if value < 0 {
            errors.push(ConfigError::invalid(
                key,
                format!("must be non-negative, got {value}"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ConfigError>, key: &str, value: &str) {
    let value = value.trim();
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| value.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));
    if !valid {
        errors.push(ConfigError::invalid(
            key,
            format!("`{value}` is not an http(s) URL"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error_for(errors: &[ConfigError], wanted: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == wanted))
    }

    #[test]
    fn default_config_validates() {
        let config = ParlanceConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ParlanceConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "storage.database_path"));
    }

    #[test]
    fn zero_concurrency_and_short_key_are_both_reported() {
        let mut config = ParlanceConfig::default();
        config.worker.concurrency = 0;
        config.blob.signing_key = Some("short".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2, "got: {errors:?}");
        assert!(has_error_for(&errors, "worker.concurrency"));
        assert!(has_error_for(&errors, "blob.signing_key"));
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let mut config = ParlanceConfig::default();
        config.analysis.base_url = "localhost:8000".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "analysis.base_url"));
    }

    #[test]
    fn negative_cost_fails_validation() {
        let mut config = ParlanceConfig::default();
        config.credits.audio_turn_cost = -1;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "credits.audio_turn_cost"));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = ParlanceConfig::default();
        config.service.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "service.log_level"));
    }
}
