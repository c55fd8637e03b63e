// src/ingest/providers/fixture.rs
//! Offline provider backed by in-memory documents or a directory of files.
//! Used by tests and by `--fixture-dir` dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FetchError;
use crate::ingest::types::FeedProvider;
use crate::registry::Source;

enum Entry {
    Body(String),
    Fail(String),
}

#[derive(Default)]
pub struct FixtureProvider {
    entries: HashMap<String, Entry>,
    delays: HashMap<String, Duration>,
    dir: Option<PathBuf>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve sources to `<dir>/<slug>.xml`, e.g. "On3 NIL" → `on3-nil.xml`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, source: &str, xml: &str) -> Self {
        self.entries.insert(source.to_string(), Entry::Body(xml.to_string()));
        self
    }

    pub fn with_failure(mut self, source: &str, reason: &str) -> Self {
        self.entries.insert(source.to_string(), Entry::Fail(reason.to_string()));
        self
    }

    /// Sleep before answering for `source`; pairs with the fetch timeout.
    pub fn with_delay(mut self, source: &str, delay: Duration) -> Self {
        self.delays.insert(source.to_string(), delay);
        self
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed to single dashes.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[async_trait]
impl FeedProvider for FixtureProvider {
    async fn fetch_body(&self, source: &Source) -> Result<String, FetchError> {
        if let Some(d) = self.delays.get(&source.name) {
            tokio::time::sleep(*d).await;
        }
        match self.entries.get(&source.name) {
            Some(Entry::Body(s)) => return Ok(s.clone()),
            Some(Entry::Fail(reason)) => return Err(FetchError::Fixture(reason.clone())),
            None => {}
        }
        let Some(dir) = &self.dir else {
            return Err(FetchError::Fixture(format!("no fixture for `{}`", source.name)));
        };
        let path = dir.join(format!("{}.xml", slug(&source.name)));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::Fixture(format!("{}: {e}", path.display())))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
