// src/error.rs
//! Error taxonomy for a monitor run.
//!
//! Only [`ConfigError`] is fatal: it aborts the run before any network
//! activity. [`FetchError`] and [`ParseError`] are isolated to the source (or
//! entry) that produced them and surface in the run metadata instead.

use std::path::PathBuf;

/// Bad or missing configuration. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NIL_CONFIG_PATH points to non-existent path {0}")]
    MissingPath(PathBuf),

    #[error("no config file found (tried $NIL_CONFIG_PATH, config/monitor.toml, config/monitor.json)")]
    NotFound,

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format `{0}` (expected toml or json)")]
    UnsupportedFormat(String),

    #[error("config has no sources")]
    NoSources,

    #[error("source #{index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate source name `{0}`")]
    DuplicateSource(String),

    #[error("source `{source_name}`: invalid priority `{value}` (expected high, medium or low)")]
    InvalidPriority { source_name: String, value: String },

    #[error("source `{source_name}`: invalid url `{url}`: {reason}")]
    InvalidUrl {
        source_name: String,
        url: String,
        reason: String,
    },

    #[error("unknown category `{0}`")]
    UnknownCategory(String),

    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Feed-level failure for one source. Recorded, never retried within a run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {0}")]
    Status(u16),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("run budget exceeded before fetch completed")]
    BudgetExceeded,

    #[error("fixture unavailable: {0}")]
    Fixture(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A feed document, or a single entry in it, could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("xml: {0}")]
    Xml(String),

    #[error("unrecognized feed root element `{0}`")]
    UnknownFormat(String),

    #[error("empty document")]
    EmptyDocument,

    #[error("entry {index}: missing {field}")]
    MissingField { index: usize, field: &'static str },
}

/// Non-error outcomes worth flagging to the notification layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunWarning {
    /// Zero articles survived filtering. The run itself succeeded.
    EmptyResult,
    /// At least one source failed; the result is partial.
    PartialSourceFailure,
}
