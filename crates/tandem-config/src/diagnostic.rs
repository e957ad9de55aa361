// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! miette diagnostics for `tandem.toml` problems.
//!
//! The config surface is two small sections, so every key is known up front.
//! Typos are matched against that table with Jaro-Winkler similarity, and
//! invalid values get a help line listing what the key accepts.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan};
use thiserror::Error;

/// Keys accepted in each section, with a short description of valid values.
const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "storage",
        &[
            ("database_path", "a file path or `:memory:`"),
            ("writer", "`serial` or `pooled`"),
            ("max_readers", "a positive integer"),
            ("busy_timeout_ms", "a non-negative integer (milliseconds)"),
            ("wal_mode", "`true` or `false`"),
        ],
    ),
    (
        "logging",
        &[("level", "one of trace, debug, info, warn, error")],
    ),
];

const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A problem found while loading or validating configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", section_label(.section))]
    #[diagnostic(
        code(tandem::config::unknown_key),
        help("{}", unknown_key_help(section, suggestion.as_deref()))
    )]
    UnknownKey {
        /// Section the key appeared in; empty for the top level.
        section: String,
        key: String,
        suggestion: Option<String>,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the key's type.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(tandem::config::invalid_value), help("`{key}` takes {}", accepted_values(key)))]
    InvalidValue { key: String, detail: String },

    /// A well-formed value that breaks a storage or logging rule.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(tandem::config::validation))]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tandem::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn keys_of(section: &str) -> Vec<&'static str> {
    if section.is_empty() {
        return SECTIONS.iter().map(|(name, _)| *name).collect();
    }
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| keys.iter().map(|(key, _)| *key).collect())
        .unwrap_or_default()
}

fn unknown_key_help(section: &str, suggestion: Option<&str>) -> String {
    let valid = keys_of(section).join(", ");
    match suggestion {
        Some(s) => format!("did you mean `{s}`? valid keys: {valid}"),
        None => format!("valid keys: {valid}"),
    }
}

fn accepted_values(key: &str) -> &'static str {
    let field = key.rsplit('.').next().unwrap_or(key);
    SECTIONS
        .iter()
        .flat_map(|(_, keys)| keys.iter())
        .find(|(name, _)| *name == field)
        .map(|(_, accepted)| *accepted)
        .unwrap_or("a value of the documented type")
}

/// Closest known key in `section` to `unknown`, if any is close enough.
pub fn suggest_key(section: &str, unknown: &str) -> Option<String> {
    keys_of(section)
        .into_iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Convert every error inside a `figment::Error` into a [`ConfigError`].
///
/// `sources` pairs file names with their contents and is used to attach a
/// labelled span to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<&str> = error.path.iter().map(String::as_str).collect();
            match &error.kind {
                Kind::UnknownField(field, _) => {
                    let section = path.first().copied().unwrap_or_default().to_string();
                    let located = locate(&error, sources, &section, field);
                    let (span, src) = located.map_or((None, None), |(span, src)| {
                        (Some(span), Some(src))
                    });
                    ConfigError::UnknownKey {
                        suggestion: suggest_key(&section, field),
                        section,
                        key: field.clone(),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(..) | Kind::InvalidValue(..) | Kind::UnknownVariant(..) => {
                    ConfigError::InvalidValue {
                        key: path.join("."),
                        detail: error.kind.to_string(),
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Span of `field` inside `[section]` of the file the error came from.
fn locate(
    error: &figment::Error,
    sources: &[(String, String)],
    section: &str,
    field: &str,
) -> Option<(SourceSpan, NamedSource<String>)> {
    let (name, content) = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => {
            let path = path.display().to_string();
            sources.iter().find(|(name, _)| *name == path)?
        }
        // Inline strings have no file; fall back to a single provided source.
        _ => match sources {
            [only] => only,
            _ => return None,
        },
    };
    let offset = find_key_offset(content, section, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` as a key inside `[section]` (or before any header
/// when `section` is empty).
pub fn find_key_offset(content: &str, section: &str, field: &str) -> Option<usize> {
    let mut offset = 0;
    let mut in_section = section.is_empty();

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_section = trimmed
                .trim_end()
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .is_some_and(|name| name.trim() == section);
        } else if in_section
            && let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Render `errors` as miette reports, one after another.
pub fn render_errors(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out
}
