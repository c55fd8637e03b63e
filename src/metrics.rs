// src/metrics.rs
//! Metric names and one-time registration. Recording goes through the
//! `metrics` facade; whether anything listens is up to the binary.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const SOURCES_ATTEMPTED: &str = "nil_sources_attempted_total";
pub const SOURCE_FAILURES: &str = "nil_source_failures_total";
pub const ARTICLES_FETCHED: &str = "nil_articles_fetched_total";
pub const PARSE_ERRORS: &str = "nil_parse_errors_total";
pub const ARTICLES_KEPT: &str = "nil_articles_kept_total";
pub const DUPLICATES_MERGED: &str = "nil_duplicates_merged_total";
pub const FETCH_MS: &str = "nil_fetch_ms";
pub const LAST_RUN_TS: &str = "nil_pipeline_last_run_ts";

/// Register descriptions once so every series shows up in the exposition.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SOURCES_ATTEMPTED, "Feed sources the fetcher tried.");
        describe_counter!(SOURCE_FAILURES, "Feed sources that failed (network, timeout, parse).");
        describe_counter!(ARTICLES_FETCHED, "Articles admitted by the fetcher inside the window.");
        describe_counter!(PARSE_ERRORS, "Feed entries dropped while parsing.");
        describe_counter!(ARTICLES_KEPT, "Articles that reached the final result.");
        describe_counter!(DUPLICATES_MERGED, "Articles folded into another story's group.");
        describe_histogram!(FETCH_MS, "Per-source fetch + parse time in milliseconds.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when the pipeline last completed.");
    });
}

/// Install a Prometheus recorder as the global recorder.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
    ensure_described();
    Ok(handle)
}
