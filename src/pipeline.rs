// src/pipeline.rs
//! # Pipeline Orchestrator
//!
//! Fetch (concurrent) → score → dedup → categorize → rank.
//!
//! The post-fetch half lives in [`process`], which is pure: the same fetch
//! outcomes and window always give an identical [`PipelineResult`]. Wall
//! clock only enters through [`run`], and timings are kept beside the result
//! in [`RunReport`], never inside it.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::categorize::{CategorizedArticle, Categorizer};
use crate::config::FetchConfig;
use crate::dedup::{deduplicate, DedupConfig};
use crate::error::RunWarning;
use crate::ingest::fetch_all;
use crate::ingest::types::{FeedProvider, FetchOutcome, LookbackWindow};
use crate::metrics::{ARTICLES_KEPT, DUPLICATES_MERGED, LAST_RUN_TS};
use crate::registry::Source;
use crate::relevance::{RelevanceScorer, ScoredArticle};

/// Everything a run needs, validated and compiled.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sources: Vec<Source>,
    pub scorer: RelevanceScorer,
    pub dedup: DedupConfig,
    pub categorizer: Categorizer,
    pub fetch: FetchConfig,
}

/// Final ranked set plus run metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sources_attempted: usize,
    /// Source name → failure reason.
    pub sources_failed: BTreeMap<String, String>,
    pub total_fetched: usize,
    pub total_after_filter: usize,
    pub total_after_dedup: usize,
    pub total_categorized: usize,
    pub parse_errors: usize,
    /// Sources whose feeds carried no dates; their entries were kept undated.
    pub undated_sources: Vec<String>,
    pub articles: Vec<CategorizedArticle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Articles were produced but some sources failed.
    QualifiedSuccess,
    /// No article survived. Not an error.
    Empty,
}

impl PipelineResult {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn status(&self) -> RunStatus {
        if self.is_empty() {
            RunStatus::Empty
        } else if !self.sources_failed.is_empty() {
            RunStatus::QualifiedSuccess
        } else {
            RunStatus::Success
        }
    }

    pub fn warnings(&self) -> Vec<RunWarning> {
        let mut w = Vec::new();
        if self.is_empty() {
            w.push(RunWarning::EmptyResult);
        }
        if !self.sources_failed.is_empty() {
            w.push(RunWarning::PartialSourceFailure);
        }
        w
    }
}

/// Milliseconds spent per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub fetch_ms: u64,
    pub score_ms: u64,
    pub dedup_ms: u64,
    pub categorize_ms: u64,
    pub total_ms: u64,
}

/// What [`run`] hands back: the reproducible result and the run's wall-clock facts.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub warnings: Vec<RunWarning>,
    pub timings: StageTimings,
    pub result: PipelineResult,
}

fn ms_since(t: Instant) -> u64 {
    t.elapsed().as_millis() as u64
}

/// Final ordering: score desc → published desc (undated last) → link asc.
fn result_cmp(a: &CategorizedArticle, b: &CategorizedArticle) -> Ordering {
    b.article
        .relevance_score
        .total_cmp(&a.article.relevance_score)
        .then_with(|| match (a.article.article.published_at, b.article.article.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.article.article.link.cmp(&b.article.article.link))
}

/// Post-fetch pipeline. Pure and idempotent.
pub fn process(outcomes: &[FetchOutcome], window: &LookbackWindow, cfg: &PipelineConfig) -> PipelineResult {
    process_timed(outcomes, window, cfg).0
}

fn process_timed(
    outcomes: &[FetchOutcome],
    window: &LookbackWindow,
    cfg: &PipelineConfig,
) -> (PipelineResult, StageTimings) {
    let mut timings = StageTimings::default();
    let by_name: HashMap<&str, &Source> = cfg.sources.iter().map(|s| (s.name.as_str(), s)).collect();

    // 1) Metadata from the fetch stage.
    let mut sources_failed = BTreeMap::new();
    let mut undated_sources = Vec::new();
    let mut total_fetched = 0;
    let mut parse_errors = 0;
    for o in outcomes {
        if let Some(err) = &o.error {
            sources_failed.insert(o.source_name.clone(), err.clone());
        }
        if o.undated_feed && !o.articles.is_empty() {
            undated_sources.push(o.source_name.clone());
        }
        total_fetched += o.articles.len();
        parse_errors += o.parse_errors;
    }

    // 2) Score + threshold.
    let t = Instant::now();
    let mut kept: Vec<ScoredArticle> = Vec::new();
    for o in outcomes {
        let Some(source) = by_name.get(o.source_name.as_str()) else {
            tracing::warn!(target: "pipeline", source = %o.source_name, "outcome for unregistered source skipped");
            continue;
        };
        kept.extend(
            o.articles
                .iter()
                .map(|a| cfg.scorer.score(a, source, window.end))
                .filter(|s| cfg.scorer.admits(s)),
        );
    }
    let total_after_filter = kept.len();
    timings.score_ms = ms_since(t);

    // 3) Dedup.
    let t = Instant::now();
    let groups = deduplicate(kept, &cfg.dedup);
    let total_after_dedup = groups.len();
    timings.dedup_ms = ms_since(t);

    // 4) Categorize + rank.
    let t = Instant::now();
    let mut articles: Vec<CategorizedArticle> =
        groups.into_iter().map(|g| cfg.categorizer.categorize(g)).collect();
    articles.sort_by(result_cmp);
    let total_categorized = articles.len();
    timings.categorize_ms = ms_since(t);

    let result = PipelineResult {
        window_start: window.start,
        window_end: window.end,
        sources_attempted: outcomes.len(),
        sources_failed,
        total_fetched,
        total_after_filter,
        total_after_dedup,
        total_categorized,
        parse_errors,
        undated_sources,
        articles,
    };
    (result, timings)
}

/// Full run: fetch every registered source, then [`process`].
pub async fn run(provider: &dyn FeedProvider, window: LookbackWindow, cfg: &PipelineConfig) -> RunReport {
    let t0 = Instant::now();
    tracing::info!(
        target: "pipeline",
        sources = cfg.sources.len(),
        window_start = %window.start,
        window_end = %window.end,
        provider = provider.name(),
        "run started"
    );

    let outcomes = fetch_all(provider, &cfg.sources, &window, &cfg.fetch).await;
    let fetch_ms = ms_since(t0);

    let (result, mut timings) = process_timed(&outcomes, &window, cfg);
    timings.fetch_ms = fetch_ms;
    timings.total_ms = ms_since(t0);

    counter!(ARTICLES_KEPT).increment(result.total_categorized as u64);
    counter!(DUPLICATES_MERGED).increment((result.total_after_filter - result.total_after_dedup) as u64);
    gauge!(LAST_RUN_TS).set(Utc::now().timestamp() as f64);

    let status = result.status();
    tracing::info!(
        target: "pipeline",
        ?status,
        attempted = result.sources_attempted,
        failed = result.sources_failed.len(),
        fetched = result.total_fetched,
        after_filter = result.total_after_filter,
        after_dedup = result.total_after_dedup,
        categorized = result.total_categorized,
        parse_errors = result.parse_errors,
        total_ms = timings.total_ms,
        "run finished"
    );
    for (name, reason) in &result.sources_failed {
        tracing::warn!(target: "pipeline", source = %name, %reason, "source failed this run");
    }
    if result.is_empty() {
        tracing::warn!(target: "pipeline", "no articles survived filtering");
    }

    RunReport {
        status,
        warnings: result.warnings(),
        timings,
        result,
    }
}
