// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./parlance.toml` > `~/.config/parlance/parlance.toml` >
//! `/etc/parlance/parlance.toml` with environment variable overrides via `PARLANCE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ParlanceConfig;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "PARLANCE_";

/// Top-level sections, used to map `PARLANCE_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "blob",
    "transcription",
    "analysis",
    "worker",
    "credits",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/parlance/parlance.toml` (system-wide)
/// 3. `~/.config/parlance/parlance.toml` (user XDG config)
/// 4. `./parlance.toml` (local directory)
/// 5. `PARLANCE_*` environment variables
pub fn load_config() -> Result<ParlanceConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ParlanceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParlanceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::file("/etc/parlance/parlance.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("parlance/parlance.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("parlance.toml"))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env key onto its dotted config path.
///
/// Only the first underscore after a known section name is a separator, so
/// `worker_job_deadline_secs` becomes `worker.job_deadline_secs`.
pub(crate) fn map_env_key(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}

/// Environment variable that overrides a dotted config path; the inverse
/// of [`map_env_key`].
pub fn env_var_for(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "_").to_ascii_uppercase())
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_first_underscore_after_section() {
        assert_eq!(map_env_key("worker_job_deadline_secs"), "worker.job_deadline_secs");
        assert_eq!(map_env_key("blob_signing_key"), "blob.signing_key");
        assert_eq!(map_env_key("credits_audio_turn_cost"), "credits.audio_turn_cost");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_var_names_invert_the_mapping() {
        for key in ["worker.job_deadline_secs", "blob.signing_key", "service.log_level"] {
            let var = env_var_for(key);
            let stripped = var.strip_prefix(ENV_PREFIX).unwrap().to_ascii_lowercase();
            assert_eq!(map_env_key(&stripped), key);
        }
        assert_eq!(env_var_for("worker.concurrency"), "PARLANCE_WORKER_CONCURRENCY");
    }
}
