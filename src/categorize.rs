//! Categorizer: ordered keyword rules over the representative's title and summary.
//!
//! Rule conditions (all case-insensitive, word-bounded like the relevance terms):
//! - `any`:       at least one term present
//! - `all`:       every term present
//! - `none`:      no term present
//! - `min_score`: representative relevance score >= value
//!
//! Every condition present on a rule must hold. Rules are checked in order and the FIRST
//! match wins, so `breaking` pre-empts `mega_deal` when both trigger.
//! No match → source category hint → `general`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dedup::{canonical_url, DeduplicationGroup};
use crate::error::ConfigError;
use crate::relevance::{compile_terms, short_hash, PriorityLevel, ScoredArticle, TermMatcher};

/// Closed set of content buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Breaking,
    #[serde(alias = "mega_deals")]
    MegaDeal,
    #[serde(alias = "collectives")]
    Collective,
    Policy,
    Legal,
    #[serde(alias = "platforms")]
    Platform,
    #[serde(alias = "trends")]
    Trend,
    General,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Breaking,
        Category::MegaDeal,
        Category::Collective,
        Category::Policy,
        Category::Legal,
        Category::Platform,
        Category::Trend,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breaking => "breaking",
            Category::MegaDeal => "mega_deal",
            Category::Collective => "collective",
            Category::Policy => "policy",
            Category::Legal => "legal",
            Category::Platform => "platform",
            Category::Trend => "trend",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let cat = match key.as_str() {
            "breaking" => Category::Breaking,
            "mega_deal" | "mega_deals" => Category::MegaDeal,
            "collective" | "collectives" => Category::Collective,
            "policy" => Category::Policy,
            "legal" => Category::Legal,
            "platform" | "platforms" => Category::Platform,
            "trend" | "trends" => Category::Trend,
            "general" => Category::General,
            _ => return Err(ConfigError::UnknownCategory(s.to_string())),
        };
        Ok(cat)
    }
}

/// One `[[categories]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default)]
    pub all: Vec<String>,
    #[serde(default)]
    pub none: Vec<String>,
    #[serde(default)]
    pub min_score: Option<f32>,
}

fn rule(category: Category, any: &[&str]) -> CategoryRule {
    CategoryRule {
        category,
        any: any.iter().map(|s| s.to_string()).collect(),
        all: Vec::new(),
        none: Vec::new(),
        min_score: None,
    }
}

/// Built-in precedence: breaking, mega_deal, policy, collective, platform, legal, trend.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        rule(Category::Breaking, &["breaking", "exclusive", "just in"]),
        rule(
            Category::MegaDeal,
            &["million", "largest", "record", "mega deal", "seven-figure", "eight-figure"],
        ),
        rule(
            Category::Policy,
            &[
                "NCAA rule",
                "NCAA rules",
                "policy",
                "regulation",
                "regulations",
                "compliance",
                "legislation",
                "executive order",
                "College Sports Commission",
            ],
        ),
        rule(
            Category::Collective,
            &["collective", "collectives", "booster", "boosters", "fund"],
        ),
        rule(
            Category::Platform,
            &["platform", "marketplace", "app", "Opendorse", "INFLCR", "NIL Go"],
        ),
        rule(
            Category::Legal,
            &["lawsuit", "court", "legal", "litigation", "settlement", "antitrust"],
        ),
        rule(
            Category::Trend,
            &["trend", "trends", "survey", "report", "analysis", "market", "study"],
        ),
    ]
}

/// A finished story, ready for downstream renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedArticle {
    /// Short hash of the representative's canonical link.
    pub id: String,
    #[serde(flatten)]
    pub article: ScoredArticle,
    pub category: Category,
    pub priority_level: PriorityLevel,
    pub alternate_sources: Vec<AlternateSource>,
}

/// Where else the story appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternateSource {
    pub source_name: String,
    pub link: String,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    category: Category,
    any: Vec<TermMatcher>,
    all: Vec<TermMatcher>,
    none: Vec<TermMatcher>,
    min_score: Option<f32>,
}

impl CompiledRule {
    fn matches(&self, text: &str, score: f32) -> bool {
        if let Some(min) = self.min_score {
            if score < min {
                return false;
            }
        }
        if !self.any.is_empty() && !self.any.iter().any(|t| t.is_match(text)) {
            return false;
        }
        if !self.all.iter().all(|t| t.is_match(text)) {
            return false;
        }
        !self.none.iter().any(|t| t.is_match(text))
    }
}

/// Compiled, ordered category rules.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CompiledRule>,
}

impl Categorizer {
    pub fn new(rules: &[CategoryRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|r| {
                if r.any.is_empty() && r.all.is_empty() {
                    return Err(ConfigError::InvalidRule {
                        rule: r.category.to_string(),
                        reason: "needs `any` or `all` terms".into(),
                    });
                }
                if let Some(m) = r.min_score {
                    if !m.is_finite() || m < 0.0 {
                        return Err(ConfigError::InvalidRule {
                            rule: r.category.to_string(),
                            reason: format!("min_score must be finite and >= 0, got {m}"),
                        });
                    }
                }
                Ok(CompiledRule {
                    category: r.category,
                    any: compile_terms(&r.any)?,
                    all: compile_terms(&r.all)?,
                    none: compile_terms(&r.none)?,
                    min_score: r.min_score,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Category for one scored article. Total: never fails.
    pub fn classify(&self, a: &ScoredArticle) -> Category {
        let text = match a.article.summary_raw.as_deref() {
            Some(s) if !s.is_empty() => format!("{} | {}", a.article.title, s),
            _ => a.article.title.clone(),
        };
        self.rules
            .iter()
            .find(|r| r.matches(&text, a.relevance_score))
            .map(|r| r.category)
            .or(a.category_hint)
            .unwrap_or(Category::General)
    }

    pub fn categorize(&self, group: DeduplicationGroup) -> CategorizedArticle {
        let DeduplicationGroup {
            mut representative,
            alternates,
        } = group;
        let category = self.classify(&representative);
        representative.category = Some(category);
        tracing::trace!(
            target: "categorize",
            source = %representative.article.source_name,
            %category,
            alternates = alternates.len(),
            "categorized"
        );
        CategorizedArticle {
            id: short_hash(&canonical_url(&representative.article.link)),
            priority_level: PriorityLevel::from_score(representative.relevance_score),
            alternate_sources: alternates
                .into_iter()
                .map(|a| AlternateSource {
                    source_name: a.article.source_name,
                    link: a.article.link,
                })
                .collect(),
            category,
            article: representative,
        }
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(&default_rules()).unwrap_or(Self { rules: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Article;
    use crate::registry::Priority;
    use std::collections::BTreeSet;

    fn scored(title: &str, summary: Option<&str>, score: f32) -> ScoredArticle {
        ScoredArticle {
            article: Article {
                title: title.into(),
                link: "https://www.example.com/story?utm_source=rss".into(),
                published_at: None,
                summary_raw: summary.map(str::to_string),
                source_name: "A".into(),
            },
            relevance_score: score,
            matched_keywords: BTreeSet::new(),
            category: None,
            source_priority: Priority::High,
            category_hint: None,
        }
    }

    #[test]
    fn category_names_round_trip() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!("Mega-Deals".parse::<Category>().unwrap(), Category::MegaDeal);
        assert!("gossip".parse::<Category>().is_err());
    }

    #[test]
    fn breaking_preempts_mega_deal() {
        let c = Categorizer::default();
        let a = scored("BREAKING: QB signs record $2M NIL deal", None, 9.0);
        assert_eq!(c.classify(&a), Category::Breaking);
        let b = scored("QB signs record $2M NIL deal", None, 9.0);
        assert_eq!(c.classify(&b), Category::MegaDeal);
    }

    #[test]
    fn summary_participates() {
        let c = Categorizer::default();
        let a = scored("Big news for athletes", Some("The booster collective expands"), 4.0);
        assert_eq!(c.classify(&a), Category::Collective);
    }

    #[test]
    fn hint_then_general() {
        let c = Categorizer::default();
        let mut a = scored("Quarterback talks about NIL", None, 4.0);
        assert_eq!(c.classify(&a), Category::General);
        a.category_hint = Some(Category::Legal);
        assert_eq!(c.classify(&a), Category::Legal);
    }

    #[test]
    fn all_none_and_min_score_conditions() {
        let rules = vec![CategoryRule {
            category: Category::Policy,
            any: vec![],
            all: vec!["NCAA".into(), "vote".into()],
            none: vec!["rumor".into()],
            min_score: Some(5.0),
        }];
        let c = Categorizer::new(&rules).unwrap();
        assert_eq!(c.classify(&scored("NCAA board vote on NIL", None, 6.0)), Category::Policy);
        assert_eq!(c.classify(&scored("NCAA board vote on NIL", None, 4.0)), Category::General);
        assert_eq!(c.classify(&scored("NCAA vote rumor", None, 6.0)), Category::General);
        assert_eq!(c.classify(&scored("NCAA board meets", None, 6.0)), Category::General);
    }

    #[test]
    fn rule_without_triggers_is_rejected() {
        let rules = vec![CategoryRule {
            category: Category::Trend,
            any: vec![],
            all: vec![],
            none: vec!["x".into()],
            min_score: None,
        }];
        assert!(matches!(Categorizer::new(&rules), Err(ConfigError::InvalidRule { .. })));
    }

    #[test]
    fn categorize_builds_alternates_and_id() {
        let c = Categorizer::default();
        let rep = scored("Lawsuit filed over NIL payments", None, 6.5);
        let mut alt = rep.clone();
        alt.article.source_name = "B".into();
        alt.article.link = "https://b.example/x".into();
        let out = c.categorize(DeduplicationGroup {
            representative: rep,
            alternates: vec![alt],
        });
        assert_eq!(out.category, Category::Legal);
        assert_eq!(out.article.category, Some(Category::Legal));
        assert_eq!(out.priority_level, PriorityLevel::High);
        assert_eq!(out.alternate_sources.len(), 1);
        assert_eq!(out.alternate_sources[0].source_name, "B");
        assert_eq!(out.id, short_hash("example.com/story"));
    }
}
