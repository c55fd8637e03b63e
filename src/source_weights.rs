//! # Source Weights
//!
//! Maps a feed source to the multiplicative trust factor the relevance scorer
//! applies to its keyword weight.
//!
//! - Tier multipliers for `high` / `medium` / `low` priority sources.
//! - Optional per-source overrides keyed by (normalized) source name.
//! - Aliases map alternative spellings to an override key.
//! - Resolution order: registry `trust_weight` → alias → exact override →
//!   substring override → tier multiplier.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::error::ConfigError;
use crate::registry::{Priority, Source};

/// Per-tier multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriorityMultipliers {
    #[serde(default = "default_high")]
    pub high: f32,
    #[serde(default = "default_medium")]
    pub medium: f32,
    #[serde(default = "default_low")]
    pub low: f32,
}

fn default_high() -> f32 {
    1.5
}
fn default_medium() -> f32 {
    1.0
}
fn default_low() -> f32 {
    0.75
}

impl Default for PriorityMultipliers {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

impl PriorityMultipliers {
    pub fn for_priority(&self, p: Priority) -> f32 {
        match p {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Configuration for source weights (the `[scoring.source_weights]` table).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceWeightsConfig {
    #[serde(default)]
    pub priority_multipliers: PriorityMultipliers,
    /// Explicit multipliers for named sources.
    #[serde(default)]
    pub overrides: BTreeMap<String, f32>,
    /// Aliases mapping non-canonical names → override keys.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl SourceWeightsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.priority_multipliers;
        let tiers = [("high", m.high), ("medium", m.medium), ("low", m.low)];
        let named = self.overrides.iter().map(|(k, v)| (k.as_str(), *v));
        for (name, w) in tiers.into_iter().chain(named) {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: format!("scoring.source_weights.{name}"),
                    reason: format!("must be finite and >= 0, got {w}"),
                });
            }
        }
        check_unique("overrides", self.overrides.keys())?;
        check_unique("aliases", self.aliases.keys())
    }

    /// Multiplier for `source`.
    pub fn weight_for(&self, source: &Source) -> f32 {
        if let Some(w) = source.trust_weight {
            return sanitize(w);
        }

        let s = normalize(&source.name);
        let lookup = |key: &str| {
            self.overrides
                .iter()
                .find(|(k, _)| normalize(k) == key)
                .map(|(_, &w)| sanitize(w))
        };

        // 1) Alias resolution.
        if let Some(canon) = self
            .aliases
            .iter()
            .find(|(a, _)| normalize(a) == s)
            .map(|(_, c)| normalize(c))
        {
            if let Some(w) = lookup(&canon) {
                return w;
            }
        }

        // 2) Exact override.
        if let Some(w) = lookup(&s) {
            return w;
        }

        // 3) Substring fallback ("ESPN College Football" → "espn"), longest key first
        //    so the result does not depend on map iteration order.
        let mut subs: Vec<(String, f32)> = self
            .overrides
            .iter()
            .map(|(k, &w)| (normalize(k), w))
            .filter(|(k, _)| !k.is_empty() && s.contains(k.as_str()))
            .collect();
        subs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        if let Some((_, w)) = subs.first() {
            return sanitize(*w);
        }

        // 4) Tier default.
        sanitize(self.priority_multipliers.for_priority(source.priority))
    }
}

/// Lowercase, separators and punctuation to spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\', ':', '|'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '‚', '’', '\''], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Two keys that normalize alike would make the chosen weight ambiguous.
fn check_unique<'a>(
    table: &str,
    keys: impl Iterator<Item = &'a String>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for k in keys {
        if !seen.insert(normalize(k)) {
            return Err(ConfigError::InvalidParameter {
                name: format!("scoring.source_weights.{table}"),
                reason: format!("`{k}` duplicates another key after normalization"),
            });
        }
    }
    Ok(())
}

fn sanitize(x: f32) -> f32 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(name: &str, priority: Priority) -> Source {
        Source {
            name: name.into(),
            url: "https://x.example/rss".into(),
            priority,
            category_hint: None,
            trust_weight: None,
        }
    }

    fn cfg() -> SourceWeightsConfig {
        let mut c = SourceWeightsConfig::default();
        c.overrides.insert("espn".into(), 1.3);
        c.overrides.insert("Business of College Sports".into(), 1.8);
        c.aliases.insert("BOCS".into(), "business of college sports".into());
        c
    }

    #[test]
    fn tier_defaults() {
        let c = SourceWeightsConfig::default();
        assert!((c.weight_for(&src("A", Priority::High)) - 1.5).abs() < 1e-6);
        assert!((c.weight_for(&src("A", Priority::Medium)) - 1.0).abs() < 1e-6);
        assert!((c.weight_for(&src("A", Priority::Low)) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn registry_trust_weight_wins() {
        let mut s = src("ESPN", Priority::Low);
        s.trust_weight = Some(2.0);
        assert!((cfg().weight_for(&s) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn exact_alias_and_substring() {
        let c = cfg();
        assert!((c.weight_for(&src("ESPN", Priority::Low)) - 1.3).abs() < 1e-6);
        assert!((c.weight_for(&src("bocs", Priority::Low)) - 1.8).abs() < 1e-6);
        assert!((c.weight_for(&src("ESPN — College Football", Priority::Low)) - 1.3).abs() < 1e-6);
        assert!((c.weight_for(&src("Business-of-College-Sports", Priority::Low)) - 1.8).abs() < 1e-6);
    }

    #[test]
    fn keys_equal_after_normalization_rejected() {
        assert!(cfg().validate().is_ok());

        let mut c = cfg();
        c.overrides.insert("ESPN".into(), 0.5);
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidParameter { name, .. }) if name.ends_with("overrides")
        ));

        let mut c = cfg();
        c.aliases.insert("B.O.C.S".into(), "espn".into());
        assert!(c.validate().is_ok());
        c.aliases.insert("bocs".into(), "espn".into());
        assert!(c.validate().is_err());
    }

    #[test]
    fn negative_multiplier_rejected() {
        let mut c = SourceWeightsConfig::default();
        c.priority_multipliers.low = -1.0;
        assert!(c.validate().is_err());
    }
}
