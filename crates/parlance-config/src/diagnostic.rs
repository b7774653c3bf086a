// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Every error is keyed by its dotted config path (`worker.concurrency`) and
//! attributed to the layer that supplied the bad value: a TOML file, the
//! inline string, or a `PARLANCE_*` environment variable. File errors get a
//! source span; env errors name the variable to fix. Unknown keys carry a
//! Jaro-Winkler "did you mean" suggestion phrased for that layer.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::env_var_for;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Source name used for configuration given as a string.
pub const INLINE_SOURCE: &str = "<inline>";

/// The configuration layer a bad value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A TOML file, or [`INLINE_SOURCE`].
    File(String),
    /// A `PARLANCE_*` environment variable.
    Env(String),
    Unknown,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(name) => f.write_str(name),
            Origin::Env(var) => write!(f, "environment variable {var}"),
            Origin::Unknown => f.write_str("configuration"),
        }
    }
}

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}` in {origin}")]
    #[diagnostic(
        code(parlance::config::unknown_key),
        help("{}", unknown_key_help(origin, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the unrecognized key.
        key: String,
        /// Dotted path of the closest valid key, if any is close enough.
        suggestion: Option<String>,
        /// Valid keys at the same level, comma separated.
        valid_keys: String,
        origin: Origin,
        #[label("not a known key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for `{key}` in {origin}: found {found}")]
    #[diagnostic(code(parlance::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        origin: Origin,
        #[label("wrong type")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value parsed but is semantically invalid.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(parlance::config::validation))]
    Validation {
        /// Dotted key, e.g. `worker.concurrency`.
        key: String,
        message: String,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(parlance::config::other))]
    Other(String),
}

impl ConfigError {
    /// Shorthand for a [`Validation`](Self::Validation) error.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Dotted config path the error is about, when it has one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownKey { key, .. }
            | Self::InvalidType { key, .. }
            | Self::Validation { key, .. } => Some(key.as_str()),
            Self::Other(_) => None,
        }
    }
}

fn unknown_key_help(origin: &Origin, suggestion: Option<&str>, valid_keys: &str) -> String {
    match (suggestion, origin) {
        (Some(s), Origin::Env(_)) => format!("did you mean `{}`?", env_var_for(s)),
        (Some(s), _) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        (None, _) => format!("valid keys: {valid_keys}"),
    }
}

/// Converts a `figment::Error` into one diagnostic per underlying error.
///
/// `sources` holds `(name, content)` for every TOML layer, highest priority
/// first; they are used to attribute errors and resolve spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let section = section_of(&error.path, field);
                let key = dotted(&section, field);
                let suggestion =
                    suggest_key(field, expected).map(|s| dotted(&section, &s));
                let origin = resolve_origin(&error, &section, field, sources);
                let (span, src) = locate(&origin, &section, field, sources);
                ConfigError::UnknownKey {
                    key,
                    suggestion,
                    valid_keys: expected.join(", "),
                    origin,
                    span,
                    src,
                }
            }
            Kind::InvalidType(actual, expected) => match error.path.split_last() {
                Some((field, section)) => {
                    let origin = resolve_origin(&error, section, field, sources);
                    let (span, src) = locate(&origin, section, field, sources);
                    ConfigError::InvalidType {
                        key: dotted(section, field),
                        found: actual.to_string(),
                        expected: expected.clone(),
                        origin,
                        span,
                        src,
                    }
                }
                None => ConfigError::Other(error.to_string()),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Figment reports unknown fields at the enclosing table; drop the field if
/// it was appended anyway.
fn section_of(path: &[String], field: &str) -> Vec<String> {
    match path.split_last() {
        Some((last, rest)) if last == field => rest.to_vec(),
        _ => path.to_vec(),
    }
}

fn dotted(section: &[String], field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", section.join("."))
    }
}

/// Attributes an error to a configuration layer.
///
/// Trusts figment's metadata when it names a file or the env provider.
/// Otherwise the key is looked up in the TOML sources, then in the
/// environment.
fn resolve_origin(
    error: &figment::Error,
    section: &[String],
    field: &str,
    sources: &[(String, String)],
) -> Origin {
    if let Some(metadata) = &error.metadata {
        if let Some(figment::Source::File(path)) = &metadata.source {
            return Origin::File(path.display().to_string());
        }
        if metadata.name.contains("environment variable") {
            return Origin::Env(env_var_for(&dotted(section, field)));
        }
    }

    if let Some((name, _)) = sources
        .iter()
        .find(|(_, content)| find_key_offset(content, section, field).is_some())
    {
        return Origin::File(name.clone());
    }

    let var = env_var_for(&dotted(section, field));
    if std::env::var_os(&var).is_some() {
        Origin::Env(var)
    } else {
        Origin::Unknown
    }
}

fn locate(
    origin: &Origin,
    section: &[String],
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Origin::File(name) = origin else {
        return (None, None);
    };
    sources
        .iter()
        .find(|(source, _)| source == name)
        .and_then(|(source, content)| {
            let offset = find_key_offset(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(source, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` inside the `[section]` table of a TOML document.
///
/// Only the table's own lines are searched, so a key of the same name in a
/// later table is not matched. An empty `section` means the top level.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let header = (!section.is_empty()).then(|| format!("[{}]", section.join(".")));
    let mut in_table = header.is_none();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_table = header
                .as_deref()
                .is_some_and(|h| trimmed.trim_end().starts_with(h));
        } else if in_table {
            if let Some(after) = trimmed.strip_prefix(field) {
                if after.trim_start().starts_with('=') {
                    return Some(offset + (line.len() - trimmed.len()));
                }
            }
        }
        offset += line.len();
    }
    None
}

/// Closest valid key by Jaro-Winkler similarity, above the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders errors with miette's graphical handler.
pub fn render_report(errors: &[ConfigError]) -> String {
    let handler = miette::GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error as &dyn Diagnostic).is_ok() {
            out.push_str(&buf);
        } else {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out
}

/// Writes [`render_report`] to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_report(errors));
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::error::{Actual, Kind};
    use figment::Metadata;

    const WORKER_KEYS: &[&str] = &[
        "concurrency",
        "queue_capacity",
        "job_deadline_secs",
        "shutdown_grace_secs",
    ];

    fn section(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    fn env_error(kind: Kind, path: &[&str]) -> figment::Error {
        let mut error = figment::Error::from(kind);
        error.metadata = Some(Metadata::named("`PARLANCE_` environment variable(s)"));
        error.path = path.iter().map(|s| s.to_string()).collect();
        error
    }

    #[test]
    fn suggests_close_worker_key() {
        assert_eq!(
            suggest_key("concurency", WORKER_KEYS),
            Some("concurrency".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", &["name", "log_level"]), None);
    }

    #[test]
    fn key_offset_stays_inside_its_table() {
        let content = "[analysis]\ntimeout_secs = 5\n\n[worker]\nconcurency = 2\n";
        assert_eq!(find_key_offset(content, &section("worker"), "timeout_secs"), None);

        let o = find_key_offset(content, &section("worker"), "concurency").unwrap();
        assert_eq!(&content[o..o + 10], "concurency");

        let o = find_key_offset(content, &section("analysis"), "timeout_secs").unwrap();
        assert_eq!(o, "[analysis]\n".len());
    }

    #[test]
    fn key_offset_requires_an_assignment() {
        let content = "[blob]\nsigning_key_old = \"x\"\n  signing_key   = \"y\"\n";
        let o = find_key_offset(content, &section("blob"), "signing_key").unwrap();
        assert_eq!(&content[o..o + 15], "signing_key   =");
        assert_eq!(find_key_offset("name = 1\n", &[], "name"), Some(0));
    }

    #[test]
    fn env_type_error_names_the_variable() {
        let error = env_error(
            Kind::InvalidType(Actual::Str("five".into()), "i64".into()),
            &["credits", "audio_turn_cost"],
        );
        let errors = figment_to_config_errors(error, &[]);
        let [ConfigError::InvalidType { key, origin, span, .. }] = errors.as_slice() else {
            panic!("unexpected errors: {errors:?}");
        };
        assert_eq!(key, "credits.audio_turn_cost");
        assert_eq!(origin, &Origin::Env("PARLANCE_CREDITS_AUDIO_TURN_COST".into()));
        assert!(span.is_none());
    }

    #[test]
    fn env_unknown_key_suggests_the_variable() {
        let error = env_error(Kind::UnknownField("concurency".into(), WORKER_KEYS), &["worker"]);
        let errors = figment_to_config_errors(error, &[]);
        let [ConfigError::UnknownKey { key, suggestion, .. }] = errors.as_slice() else {
            panic!("unexpected errors: {errors:?}");
        };
        assert_eq!(key, "worker.concurency");
        assert_eq!(suggestion.as_deref(), Some("worker.concurrency"));
        let help = errors[0].help().unwrap().to_string();
        assert_eq!(help, "did you mean `PARLANCE_WORKER_CONCURRENCY`?");
    }

    #[test]
    fn unattributed_error_is_found_in_sources() {
        let mut error = figment::Error::from(Kind::UnknownField("concurency".into(), WORKER_KEYS));
        error.path = vec!["worker".into()];
        let sources = vec![
            ("/etc/parlance/parlance.toml".to_string(), "[service]\nname = \"a\"\n".to_string()),
            (INLINE_SOURCE.to_string(), "[worker]\nconcurency = 2\n".to_string()),
        ];
        let errors = figment_to_config_errors(error, &sources);
        let [ConfigError::UnknownKey { origin, span, src, .. }] = errors.as_slice() else {
            panic!("unexpected errors: {errors:?}");
        };
        assert_eq!(origin, &Origin::File(INLINE_SOURCE.into()));
        assert_eq!(span.as_ref().map(|s| s.offset()), Some("[worker]\n".len()));
        assert!(src.is_some());
    }

    #[test]
    fn report_mentions_key_and_origin() {
        let errors = vec![
            ConfigError::invalid("worker.concurrency", "must be at least 1"),
            ConfigError::InvalidType {
                key: "worker.queue_capacity".into(),
                found: "string \"lots\"".into(),
                expected: "u64".into(),
                origin: Origin::File("parlance.toml".into()),
                span: None,
                src: None,
            },
        ];
        assert_eq!(errors[0].key(), Some("worker.concurrency"));
        let report = render_report(&errors);
        assert!(report.contains("worker.concurrency"));
        assert!(report.contains("in parlance.toml"));
    }
}
