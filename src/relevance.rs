// src/relevance.rs
//! Relevance scorer: term matchers, keyword rule config, compilation and
//! scoring.
//!
//! score = Σ keyword weights × source multiplier + recency bonus
//!
//! Keyword weights are summed first so that a strong match survives a
//! low-priority multiplier; the recency bonus is added last.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::categorize::Category;
use crate::error::ConfigError;
use crate::ingest::types::Article;
use crate::registry::{Priority, Source};
use crate::source_weights::SourceWeightsConfig;

// --- env defaults & names ---
pub const DEFAULT_MIN_SCORE: f32 = 2.0;
pub const ENV_MIN_SCORE: &str = "NIL_MIN_SCORE";

// Dev logging gate: NIL_DEV_LOG=1 AND dev env (debug build or NIL_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("NIL_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("NIL_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// First 6 bytes of SHA-256, hex encoded.
pub(crate) fn short_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn dev_log_relevance(event: &str, article: &Article, matched: &BTreeSet<String>, score: f32, min: f32) {
    if !dev_logging_enabled() {
        return;
    }
    let id = short_hash(&article.link);
    let matched_short: Vec<&String> = matched.iter().take(5).collect();
    info!(
        target: "relevance",
        %id, %score, min_score = %min, event,
        source = %article.source_name,
        matched = ?matched_short
    );
}

// parse optional float env; negatives and garbage ignored
fn parse_min_score_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/* ----------------------------
Term matching
---------------------------- */

/// Case-insensitive lexical matcher for one keyword or phrase.
///
/// Word boundaries are enforced on each side that starts/ends with a word
/// character ("NIL" does not match "vanilla"); inner whitespace matches any
/// run of whitespace.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    re: Regex,
}

impl TermMatcher {
    pub fn new(term: &str) -> Result<Self, ConfigError> {
        let t = term.trim();
        if t.is_empty() {
            return Err(ConfigError::InvalidRule {
                rule: term.to_string(),
                reason: "empty term".into(),
            });
        }
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let body = t
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");
        let lead = if t.starts_with(is_word) { r"\b" } else { "" };
        let trail = if t.ends_with(is_word) { r"\b" } else { "" };
        let re = Regex::new(&format!("(?i){lead}{body}{trail}")).map_err(|e| {
            ConfigError::InvalidRule {
                rule: t.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            term: t.to_string(),
            re,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }
}

pub(crate) fn compile_terms(terms: &[String]) -> Result<Vec<TermMatcher>, ConfigError> {
    terms.iter().map(|t| TermMatcher::new(t)).collect()
}

/* ----------------------------
Config schema
---------------------------- */

fn one() -> f32 {
    1.0
}
fn default_title_weight() -> f32 {
    3.0
}
fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}
fn default_recency_max_bonus() -> f32 {
    2.0
}
fn default_half_life_hours() -> f32 {
    72.0
}

/// A tier of keywords sharing one weight.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordGroup {
    pub name: String,
    #[serde(default = "one")]
    pub weight: f32,
    /// Anchor hits override the exclusion list.
    #[serde(default)]
    pub anchor: bool,
    pub terms: Vec<String>,
}

/// The `[keywords]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRules {
    #[serde(default = "default_title_weight")]
    pub title_weight: f32,
    #[serde(default = "one")]
    pub summary_weight: f32,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub groups: Vec<KeywordGroup>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl KeywordRules {
    /// Built-in NIL vocabulary, used when the config has no `[keywords]` table.
    pub fn default_seed() -> Self {
        let group = |name: &str, weight: f32, anchor: bool, terms: &[&str]| KeywordGroup {
            name: name.to_string(),
            weight,
            anchor,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        };
        Self {
            title_weight: default_title_weight(),
            summary_weight: 1.0,
            exclude: ["fantasy football", "mock draft", "betting odds", "sportsbook"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            groups: vec![
                group(
                    "core",
                    1.0,
                    true,
                    &[
                        "NIL",
                        "name, image and likeness",
                        "name, image, and likeness",
                        "name image likeness",
                        "NIL deal",
                        "NIL collective",
                        "revenue sharing",
                        "House settlement",
                        "athlete compensation",
                        "endorsement deal",
                    ],
                ),
                group(
                    "high_priority",
                    0.67,
                    false,
                    &[
                        "million",
                        "record",
                        "lawsuit",
                        "NCAA rule",
                        "transfer portal",
                        "executive order",
                        "College Sports Commission",
                    ],
                ),
                group(
                    "entity",
                    0.5,
                    false,
                    &[
                        "NCAA",
                        "SEC",
                        "Big Ten",
                        "ACC",
                        "Big 12",
                        "Opendorse",
                        "INFLCR",
                        "Dreamfield",
                        "NIL Go",
                    ],
                ),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("keywords.title_weight", self.title_weight)?;
        check_non_negative("keywords.summary_weight", self.summary_weight)?;
        for g in &self.groups {
            check_non_negative(&format!("keywords.groups.{}.weight", g.name), g.weight)?;
        }
        Ok(())
    }
}

/// The `[scoring]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Exclusive lower bound: an article must score strictly above this.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_recency_max_bonus")]
    pub recency_max_bonus: f32,
    #[serde(default = "default_half_life_hours")]
    pub recency_half_life_hours: f32,
    #[serde(default)]
    pub source_weights: SourceWeightsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            recency_max_bonus: default_recency_max_bonus(),
            recency_half_life_hours: default_half_life_hours(),
            source_weights: SourceWeightsConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Apply `NIL_MIN_SCORE` if set to a valid non-negative number.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_min_score_env(std::env::var(ENV_MIN_SCORE).ok()) {
            self.min_score = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("scoring.min_score", self.min_score)?;
        check_non_negative("scoring.recency_max_bonus", self.recency_max_bonus)?;
        if !(self.recency_half_life_hours.is_finite() && self.recency_half_life_hours > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "scoring.recency_half_life_hours".into(),
                reason: format!("must be > 0, got {}", self.recency_half_life_hours),
            });
        }
        self.source_weights.validate()
    }
}

pub(crate) fn check_non_negative(name: &str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be finite and >= 0, got {v}"),
        })
    }
}

/* ----------------------------
Scored output
---------------------------- */

/// An article with its relevance verdict attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub relevance_score: f32,
    pub matched_keywords: BTreeSet<String>,
    /// Set by the categorizer.
    #[serde(skip_serializing)]
    pub category: Option<Category>,
    pub source_priority: Priority,
    #[serde(skip_serializing)]
    pub category_hint: Option<Category>,
}

/// Editorial urgency bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 10.0 {
            Self::Critical
        } else if score >= 6.0 {
            Self::High
        } else if score >= 3.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/* ----------------------------
Compiled scorer
---------------------------- */

#[derive(Debug, Clone)]
struct CompiledGroup {
    weight: f32,
    anchor: bool,
    terms: Vec<TermMatcher>,
}

/// Compiled keyword rules plus scoring parameters.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    groups: Vec<CompiledGroup>,
    exclude: Vec<TermMatcher>,
    title_weight: f32,
    summary_weight: f32,
    pub scoring: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(rules: &KeywordRules, scoring: ScoringConfig) -> Result<Self, ConfigError> {
        rules.validate()?;
        scoring.validate()?;
        let groups = rules
            .groups
            .iter()
            .map(|g| {
                Ok(CompiledGroup {
                    weight: g.weight,
                    anchor: g.anchor,
                    terms: compile_terms(&g.terms)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            groups,
            exclude: compile_terms(&rules.exclude)?,
            title_weight: rules.title_weight,
            summary_weight: rules.summary_weight,
            scoring,
        })
    }

    pub fn min_score(&self) -> f32 {
        self.scoring.min_score
    }

    /// Recency bonus for an article published at `published` relative to `window_end`.
    /// Halves every `recency_half_life_hours`; undated articles get nothing.
    pub fn recency_bonus(&self, published: Option<DateTime<Utc>>, window_end: DateTime<Utc>) -> f32 {
        let Some(ts) = published else {
            return 0.0;
        };
        let age_hours = ((window_end - ts).num_seconds().max(0) as f32) / 3600.0;
        self.scoring.recency_max_bonus * 0.5f32.powf(age_hours / self.scoring.recency_half_life_hours)
    }

    /// Score one article from `source`.
    pub fn score(&self, article: &Article, source: &Source, window_end: DateTime<Utc>) -> ScoredArticle {
        let title = article.title.as_str();
        let summary = article.summary_raw.as_deref().unwrap_or("");

        let mut matched = BTreeSet::new();
        let mut keyword_sum = 0.0f32;
        let mut anchored = false;

        for g in &self.groups {
            for t in &g.terms {
                let in_title = t.is_match(title);
                let in_summary = !summary.is_empty() && t.is_match(summary);
                if !(in_title || in_summary) {
                    continue;
                }
                if in_title {
                    keyword_sum += g.weight * self.title_weight;
                }
                if in_summary {
                    keyword_sum += g.weight * self.summary_weight;
                }
                anchored |= g.anchor;
                matched.insert(t.term().to_string());
            }
        }

        let excluded_by = if anchored {
            None
        } else {
            self.exclude
                .iter()
                .find(|t| t.is_match(title) || t.is_match(summary))
        };

        let relevance_score = if let Some(t) = excluded_by {
            tracing::debug!(target: "relevance", term = t.term(), source = %source.name, "excluded");
            matched.clear();
            0.0
        } else if matched.is_empty() {
            0.0
        } else {
            let multiplier = self.scoring.source_weights.weight_for(source);
            keyword_sum * multiplier + self.recency_bonus(article.published_at, window_end)
        };

        let scored = ScoredArticle {
            article: article.clone(),
            relevance_score: relevance_score.max(0.0),
            matched_keywords: matched,
            category: None,
            source_priority: source.priority,
            category_hint: source.category_hint,
        };

        let event = if self.admits(&scored) { "kept" } else { "dropped" };
        dev_log_relevance(event, article, &scored.matched_keywords, scored.relevance_score, self.min_score());
        scored
    }

    /// Strictly above the threshold and at least one keyword matched.
    pub fn admits(&self, scored: &ScoredArticle) -> bool {
        !scored.matched_keywords.is_empty() && scored.relevance_score > self.scoring.min_score
    }
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn source(priority: Priority) -> Source {
        Source {
            name: "Feed".into(),
            url: "https://feed.example/rss".into(),
            priority,
            category_hint: None,
            trust_weight: None,
        }
    }

    fn article(title: &str, summary: Option<&str>, published_at: Option<DateTime<Utc>>) -> Article {
        Article {
            title: title.into(),
            link: format!("https://feed.example/{}", title.len()),
            published_at,
            summary_raw: summary.map(str::to_string),
            source_name: "Feed".into(),
        }
    }

    fn rules() -> KeywordRules {
        KeywordRules {
            title_weight: 3.0,
            summary_weight: 1.0,
            exclude: vec!["fantasy football".into()],
            groups: vec![
                KeywordGroup {
                    name: "core".into(),
                    weight: 1.0,
                    anchor: true,
                    terms: vec!["NIL".into(), "name, image and likeness".into()],
                },
                KeywordGroup {
                    name: "entity".into(),
                    weight: 0.5,
                    anchor: false,
                    terms: vec!["NCAA".into()],
                },
            ],
        }
    }

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::new(&rules(), ScoringConfig::default()).unwrap()
    }

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap()
    }

    #[test]
    fn term_matcher_respects_word_boundaries() {
        let m = TermMatcher::new("NIL").unwrap();
        assert!(m.is_match("New NIL deal"));
        assert!(m.is_match("nil collectives grow"));
        assert!(!m.is_match("vanilla ice cream"));

        let p = TermMatcher::new("name,  image and likeness").unwrap();
        assert!(p.is_match("Name, image and\nlikeness rights"));

        let d = TermMatcher::new("$1M").unwrap();
        assert!(d.is_match("a $1M deal"));
    }

    #[test]
    fn title_hits_outweigh_summary_hits() {
        let s = scorer();
        let t = s.score(&article("NIL deal signed", None, None), &source(Priority::Medium), end());
        let b = s.score(&article("Deal signed", Some("an NIL agreement"), None), &source(Priority::Medium), end());
        assert!((t.relevance_score - 3.0).abs() < 1e-6);
        assert!((b.relevance_score - 1.0).abs() < 1e-6);
        assert!(t.matched_keywords.contains("NIL"));
    }

    #[test]
    fn priority_multiplies_keywords_then_recency_adds() {
        let s = scorer();
        let a = article("NIL and NCAA", None, Some(end()));
        let hi = s.score(&a, &source(Priority::High), end());
        // (3.0 + 1.5) * 1.5 + full recency bonus 2.0
        assert!((hi.relevance_score - (4.5 * 1.5 + 2.0)).abs() < 1e-4);
        let lo = s.score(&a, &source(Priority::Low), end());
        assert!((lo.relevance_score - (4.5 * 0.75 + 2.0)).abs() < 1e-4);
    }

    #[test]
    fn recency_decays_monotonically() {
        let s = scorer();
        let fresh = s.recency_bonus(Some(end() - Duration::hours(1)), end());
        let day = s.recency_bonus(Some(end() - Duration::hours(24)), end());
        let week = s.recency_bonus(Some(end() - Duration::hours(168)), end());
        assert!(fresh > day && day > week && week > 0.0);
        let half = s.recency_bonus(Some(end() - Duration::hours(72)), end());
        assert!((half - 1.0).abs() < 1e-4);
        assert_eq!(s.recency_bonus(None, end()), 0.0);
    }

    #[test]
    fn no_keywords_means_zero_even_when_fresh() {
        let s = scorer();
        let r = s.score(&article("Weather update", None, Some(end())), &source(Priority::High), end());
        assert_eq!(r.relevance_score, 0.0);
        assert!(!s.admits(&r));
    }

    #[test]
    fn exclusion_applies_unless_anchor_matches() {
        let s = scorer();
        let r = s.score(
            &article("NCAA fantasy football picks", None, None),
            &source(Priority::High),
            end(),
        );
        assert_eq!(r.relevance_score, 0.0);
        assert!(r.matched_keywords.is_empty());

        let r = s.score(
            &article("NIL money reaches fantasy football", None, None),
            &source(Priority::Medium),
            end(),
        );
        assert!(r.relevance_score > 0.0);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut cfg = ScoringConfig::default();
        cfg.min_score = 3.0;
        let s = RelevanceScorer::new(&rules(), cfg).unwrap();
        let at = s.score(&article("NIL update", None, None), &source(Priority::Medium), end());
        assert!((at.relevance_score - 3.0).abs() < 1e-6);
        assert!(!s.admits(&at));

        let above = s.score(&article("NIL update", Some("NIL"), None), &source(Priority::Medium), end());
        assert!((above.relevance_score - 4.0).abs() < 1e-6);
        assert!(s.admits(&above));
    }

    #[test]
    fn priority_levels() {
        assert_eq!(PriorityLevel::from_score(12.0), PriorityLevel::Critical);
        assert_eq!(PriorityLevel::from_score(6.0), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(3.5), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(2.9), PriorityLevel::Low);
    }

    #[test]
    fn min_score_env_parsing() {
        assert_eq!(parse_min_score_env(Some(" 4.5 ".into())), Some(4.5));
        assert_eq!(parse_min_score_env(Some("-1".into())), None);
        assert_eq!(parse_min_score_env(Some("abc".into())), None);
        assert_eq!(parse_min_score_env(None), None);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut r = rules();
        r.groups[0].weight = -1.0;
        assert!(RelevanceScorer::new(&r, ScoringConfig::default()).is_err());

        let mut c = ScoringConfig::default();
        c.recency_half_life_hours = 0.0;
        assert!(RelevanceScorer::new(&rules(), c).is_err());
    }
}
