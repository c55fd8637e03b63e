// src/ingest/types.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::registry::Source;

/// One feed entry as fetched. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary_raw: Option<String>,
    pub source_name: String,
}

/// Half-open admission range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `[end - days, end)`.
    pub fn days_before(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Retrieves the raw feed document for a source.
#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_body(&self, source: &Source) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

/// Everything the fetch stage learned about one source.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub source_name: String,
    pub articles: Vec<Article>,
    /// Display form of the [`FetchError`] when the source failed.
    pub error: Option<String>,
    /// Entries present in the document before any filtering.
    pub entries_seen: usize,
    /// Entries dropped for missing title/link or a missing date in a dated feed.
    pub parse_errors: usize,
    pub outside_window: usize,
    /// No entry in the feed carried a usable date, so undated entries were kept.
    pub undated_feed: bool,
    pub elapsed_ms: u64,
}

impl FetchOutcome {
    pub fn failed(source_name: &str, err: &FetchError, elapsed_ms: u64) -> Self {
        Self {
            source_name: source_name.to_string(),
            error: Some(err.to_string()),
            elapsed_ms,
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
