//! Same-story grouping across sources.
//!
//! Two scored articles are one story when either
//! - their normalized titles have Sørensen–Dice similarity above `title_similarity`, or
//! - their links reduce to the same canonical URL.
//!
//! The relation is closed transitively (union-find over every pair in the run),
//! so A~B and B~C put A, B and C in one group even if A and C look nothing alike.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::ConfigError;
use crate::relevance::ScoredArticle;

fn default_title_similarity() -> f32 {
    0.80
}

/// The `[dedup]` table.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DedupConfig {
    /// Similarity in [0, 1). Pairs strictly above it are the same story.
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_similarity: default_title_similarity(),
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.title_similarity;
        if t.is_finite() && (0.0..1.0).contains(&t) {
            Ok(())
        } else {
            Err(ConfigError::InvalidParameter {
                name: "dedup.title_similarity".into(),
                reason: format!("must be in [0, 1), got {t}"),
            })
        }
    }
}

/// One story: the best-ranked article plus every other copy of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeduplicationGroup {
    pub representative: ScoredArticle,
    /// Remaining members, best-ranked first.
    pub alternates: Vec<ScoredArticle>,
}

impl DeduplicationGroup {
    pub fn len(&self) -> usize {
        1 + self.alternates.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "with", "at", "by", "from",
    "as", "is", "are", "was", "be", "its", "it", "this", "that", "after", "over", "into",
];

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "mc_cid", "mc_eid", "ref", "cmpid", "ocid", "smid", "sr_share",
];

/// Case-fold, strip punctuation, drop stopwords.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two already-normalized titles; empty titles never match.
pub fn title_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::sorensen_dice(a, b) as f32
}

/// Link reduced to the parts that identify the story.
///
/// Scheme dropped, host lowercased without `www.`, fragment and tracking
/// parameters removed, remaining parameters sorted, trailing slash trimmed.
/// Links that do not parse fall back to their trimmed lowercase form.
pub fn canonical_url(link: &str) -> String {
    let trimmed = link.trim();
    let Ok(url) = url::Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_lowercase();
    };

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let mut out = String::from(host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let q = params
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
            .collect::<Vec<_>>()
            .join("&");
        out.push('?');
        out.push_str(&q);
    }
    out
}

/// Total order for choosing representatives; `Less` ranks first.
/// Score desc → source priority desc → earliest publish (undated last) → link asc.
pub fn rank_cmp(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.source_priority.cmp(&a.source_priority))
        .then_with(|| match (a.article.published_at, b.article.published_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.article.link.cmp(&b.article.link))
        .then_with(|| a.article.source_name.cmp(&b.article.source_name))
}

/* ---- union-find ---- */

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        // smaller index becomes root so grouping is input-order stable
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi] = lo;
        true
    }
}

/// Group `articles` into stories. Output is in representative rank order.
pub fn deduplicate(articles: Vec<ScoredArticle>, cfg: &DedupConfig) -> Vec<DeduplicationGroup> {
    let n = articles.len();
    let titles: Vec<String> = articles.iter().map(|a| normalize_title(&a.article.title)).collect();
    let urls: Vec<String> = articles.iter().map(|a| canonical_url(&a.article.link)).collect();

    let mut sets = DisjointSet::new(n);
    let mut merges = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let same = urls[i] == urls[j]
                || title_similarity(&titles[i], &titles[j]) > cfg.title_similarity;
            if same && sets.union(i, j) {
                merges += 1;
            }
        }
    }

    let mut buckets: Vec<Vec<ScoredArticle>> = (0..n).map(|_| Vec::new()).collect();
    for (i, a) in articles.into_iter().enumerate() {
        let root = sets.find(i);
        buckets[root].push(a);
    }

    let mut groups: Vec<DeduplicationGroup> = buckets
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|mut members| {
            members.sort_by(rank_cmp);
            let representative = members.remove(0);
            DeduplicationGroup {
                representative,
                alternates: members,
            }
        })
        .collect();
    groups.sort_by(|a, b| rank_cmp(&a.representative, &b.representative));

    tracing::debug!(target: "dedup", input = n, groups = groups.len(), merges, "deduplicated");
    groups
}
