// src/registry.rs
//! # Source Registry
//!
//! Validates the configured feed list into an ordered, immutable sequence of
//! [`Source`]s. Any problem here is a [`ConfigError`] and stops the run before
//! the first request goes out.
//!
//! - Names are trimmed and must be unique (case-insensitive).
//! - Priority must be one of `high`, `medium`, `low`.
//! - URLs must parse as absolute `http`/`https` URLs. No network checks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::categorize::Category;
use crate::error::ConfigError;

/// Source priority tier. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

/// A validated feed source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub priority: Priority,
    pub category_hint: Option<Category>,
    /// Explicit trust multiplier; overrides the tier default when set.
    pub trust_weight: Option<f32>,
}

/// Raw, unvalidated source entry as it appears in the config file.
///
/// Every field is optional here so that validation can name the missing one
/// instead of surfacing a generic serde error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category_hint: Option<String>,
    #[serde(default)]
    pub trust_weight: Option<f32>,
}

/// Validate raw specs into the ordered registry.
pub fn load(specs: &[SourceSpec]) -> Result<Vec<Source>, ConfigError> {
    if specs.is_empty() {
        return Err(ConfigError::NoSources);
    }

    let mut seen = HashSet::with_capacity(specs.len());
    let mut out = Vec::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let name = required(index, "name", spec.name.as_deref())?;
        if !seen.insert(name.to_lowercase()) {
            return Err(ConfigError::DuplicateSource(name));
        }

        let url = required(index, "url", spec.url.as_deref())?;
        validate_url(&name, &url)?;

        let raw_priority = required(index, "priority", spec.priority.as_deref())?;
        let priority =
            Priority::from_str(&raw_priority).map_err(|_| ConfigError::InvalidPriority {
                source_name: name.clone(),
                value: raw_priority.clone(),
            })?;

        let category_hint = match spec.category_hint.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Category::from_str(raw).map_err(|_| ConfigError::UnknownCategory(raw.to_string()))?,
            ),
        };

        if let Some(w) = spec.trust_weight {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: format!("sources.{name}.trust_weight"),
                    reason: format!("must be finite and >= 0, got {w}"),
                });
            }
        }

        out.push(Source {
            name,
            url,
            priority,
            category_hint,
            trust_weight: spec.trust_weight,
        });
    }

    Ok(out)
}

fn required(index: usize, field: &'static str, v: Option<&str>) -> Result<String, ConfigError> {
    match v.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ConfigError::MissingField { index, field }),
    }
}

fn validate_url(name: &str, raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        source_name: name.to_string(),
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(())
}
