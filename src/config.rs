// src/config.rs
//! Monitor configuration: one file, read once at run start.
//!
//! Resolution:
//! 1) `$NIL_CONFIG_PATH` (must exist)
//! 2) `config/monitor.toml`
//! 3) `config/monitor.json`
//!
//! Format is picked by extension. Everything except `[[sources]]` has
//! defaults; `build()` validates the lot into a [`PipelineConfig`] and is the
//! only place a [`ConfigError`] can come from.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::categorize::{default_rules, Categorizer, CategoryRule};
use crate::dedup::DedupConfig;
use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use crate::registry::{self, SourceSpec};
use crate::relevance::{KeywordRules, RelevanceScorer, ScoringConfig};

pub const ENV_CONFIG_PATH: &str = "NIL_CONFIG_PATH";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    format!("nil-news-monitor/{}", env!("CARGO_PKG_VERSION"))
}

/// The `[fetch]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overall wall-clock budget; unset means wait for every source.
    #[serde(default)]
    pub run_budget_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            run_budget_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "fetch.concurrency".into(),
                reason: "must be >= 1".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "fetch.timeout_secs".into(),
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// Whole config file, as deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub keywords: KeywordRules,
    #[serde(default = "default_rules")]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl MonitorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Validate and compile. `NIL_MIN_SCORE` is applied here.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let sources = registry::load(&self.sources)?;

        let mut keywords = self.keywords;
        if keywords.groups.is_empty() {
            tracing::warn!(target: "config", "no keyword groups configured; using built-in NIL vocabulary");
            keywords.groups = KeywordRules::default_seed().groups;
        }

        let mut scoring = self.scoring;
        scoring.apply_env_overrides();
        let scorer = RelevanceScorer::new(&keywords, scoring)?;

        self.dedup.validate()?;
        let categorizer = Categorizer::new(&self.categories)?;
        self.fetch.validate()?;

        Ok(PipelineConfig {
            sources,
            scorer,
            dedup: self.dedup,
            categorizer,
            fetch: self.fetch,
        })
    }
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "toml" => MonitorConfig::from_toml_str(&content),
        "json" => MonitorConfig::from_json_str(&content),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Path the default lookup would use, without reading it.
pub fn resolve_path() -> Result<PathBuf, ConfigError> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        return if pb.exists() {
            Ok(pb)
        } else {
            Err(ConfigError::MissingPath(pb))
        };
    }
    ["config/monitor.toml", "config/monitor.json"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(ConfigError::NotFound)
}

/// Load using env var + fallbacks.
pub fn load_default() -> Result<MonitorConfig, ConfigError> {
    let path = resolve_path()?;
    tracing::debug!(target: "config", path = %path.display(), "loading config");
    load_from(&path)
}
