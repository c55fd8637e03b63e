// src/ingest/mod.rs
//! Feed Fetcher: retrieves every configured source through a bounded pool,
//! parses entries and applies the lookback window.
//!
//! A failing source never aborts the run. Its error is recorded on its
//! [`FetchOutcome`] and the other sources carry on.

pub mod feed;
pub mod providers;
pub mod types;

use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use crate::config::FetchConfig;
use crate::error::{FetchError, ParseError};
use crate::ingest::feed::{parse_date, parse_feed};
use crate::ingest::types::{Article, FeedProvider, FetchOutcome, LookbackWindow};
use crate::metrics::{ARTICLES_FETCHED, FETCH_MS, PARSE_ERRORS, SOURCES_ATTEMPTED, SOURCE_FAILURES};
use crate::registry::Source;

const MAX_TEXT_CHARS: usize = 1500;

/// Normalize feed text: decode entities, strip tags, fold typographic quotes,
/// collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    // Summaries often arrive double-escaped (`&amp;lt;p&amp;gt;`), so decode around tag stripping.
    let decoded = html_escape::decode_html_entities(s);
    let stripped = re_tags.replace_all(&decoded, " ");
    let mut out = html_escape::decode_html_entities(&stripped)
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Turn a feed document into window-filtered articles for `source`.
///
/// The undated-feed decision is made once per document: if no entry carries
/// a usable date, undated entries are kept; otherwise they are dropped.
pub fn extract_articles(
    source: &Source,
    window: &LookbackWindow,
    body: &str,
) -> Result<FetchOutcome, ParseError> {
    let entries = parse_feed(body)?;
    let dates: Vec<_> = entries
        .iter()
        .map(|e| e.date.as_deref().and_then(parse_date))
        .collect();
    let undated_feed = !entries.is_empty() && dates.iter().all(Option::is_none);

    let mut out = FetchOutcome {
        source_name: source.name.clone(),
        entries_seen: entries.len(),
        undated_feed,
        ..Default::default()
    };

    for (index, (entry, published_at)) in entries.into_iter().zip(dates).enumerate() {
        let title = entry.title.as_deref().map(normalize_text).unwrap_or_default();
        if title.is_empty() {
            tracing::debug!(source = %source.name, error = %ParseError::MissingField { index, field: "title" }, "entry dropped");
            out.parse_errors += 1;
            continue;
        }
        let Some(link) = entry.link else {
            tracing::debug!(source = %source.name, error = %ParseError::MissingField { index, field: "link" }, "entry dropped");
            out.parse_errors += 1;
            continue;
        };

        match published_at {
            Some(ts) if !window.contains(ts) => {
                out.outside_window += 1;
                continue;
            }
            None if !undated_feed => {
                tracing::debug!(source = %source.name, index, "undated entry in dated feed dropped");
                out.parse_errors += 1;
                continue;
            }
            _ => {}
        }

        let summary_raw = entry
            .summary
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());

        out.articles.push(Article {
            title,
            link,
            published_at,
            summary_raw,
            source_name: source.name.clone(),
        });
    }

    Ok(out)
}

/// Fetch and parse one source under a timeout. Never fails: errors are
/// folded into the returned outcome.
pub async fn fetch_source(
    provider: &dyn FeedProvider,
    source: &Source,
    window: &LookbackWindow,
    timeout: Duration,
) -> FetchOutcome {
    let t0 = Instant::now();
    counter!(SOURCES_ATTEMPTED).increment(1);

    let res = match tokio::time::timeout(timeout, provider.fetch_body(source)).await {
        Ok(r) => r,
        Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
    };
    let res = res.and_then(|body| extract_articles(source, window, &body).map_err(FetchError::from));
    let elapsed_ms = t0.elapsed().as_millis() as u64;
    histogram!(FETCH_MS).record(elapsed_ms as f64);

    match res {
        Ok(mut outcome) => {
            outcome.elapsed_ms = elapsed_ms;
            counter!(ARTICLES_FETCHED).increment(outcome.articles.len() as u64);
            counter!(PARSE_ERRORS).increment(outcome.parse_errors as u64);
            tracing::info!(
                target: "ingest",
                source = %source.name,
                provider = provider.name(),
                seen = outcome.entries_seen,
                kept = outcome.articles.len(),
                outside_window = outcome.outside_window,
                parse_errors = outcome.parse_errors,
                undated_feed = outcome.undated_feed,
                elapsed_ms,
                "source fetched"
            );
            outcome
        }
        Err(e) => {
            tracing::warn!(target: "ingest", source = %source.name, error = %e, elapsed_ms, "source failed");
            counter!(SOURCE_FAILURES).increment(1);
            FetchOutcome::failed(&source.name, &e, elapsed_ms)
        }
    }
}

/// Fetch every source concurrently (at most `cfg.concurrency` in flight).
///
/// Outcomes come back in registry order regardless of completion order. When
/// the optional run budget runs out, sources still pending are reported as
/// failed with [`FetchError::BudgetExceeded`].
pub async fn fetch_all(
    provider: &dyn FeedProvider,
    sources: &[Source],
    window: &LookbackWindow,
    cfg: &FetchConfig,
) -> Vec<FetchOutcome> {
    crate::metrics::ensure_described();
    let t0 = Instant::now();
    let timeout = cfg.timeout();
    let deadline = cfg.run_budget().map(|b| tokio::time::Instant::now() + b);

    let mut slots: Vec<Option<FetchOutcome>> = vec![None; sources.len()];
    {
        let mut pending = stream::iter(sources.iter().enumerate())
            .map(|(i, source)| async move {
                (i, fetch_source(provider, source, window, timeout).await)
            })
            .buffer_unordered(cfg.concurrency.max(1));

        loop {
            let next = match deadline {
                Some(d) => match tokio::time::timeout_at(d, pending.next()).await {
                    Ok(n) => n,
                    Err(_) => {
                        tracing::warn!(target: "ingest", "run budget exhausted; proceeding with completed sources");
                        break;
                    }
                },
                None => pending.next().await,
            };
            match next {
                Some((i, outcome)) => slots[i] = Some(outcome),
                None => break,
            }
        }
    }

    let elapsed_ms = t0.elapsed().as_millis() as u64;
    slots
        .into_iter()
        .zip(sources)
        .map(|(slot, source)| {
            slot.unwrap_or_else(|| {
                counter!(SOURCE_FAILURES).increment(1);
                FetchOutcome::failed(&source.name, &FetchError::BudgetExceeded, elapsed_ms)
            })
        })
        .collect()
}
