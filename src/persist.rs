// src/persist.rs
//! Dated data files for audit and for downstream renderers.
//!
//! - `<dir>/nil_articles_YYYYMMDD.json`: flat array of [`ArticleRecord`]
//! - `<dir>/nil_run_YYYYMMDD.json`: the whole [`RunReport`]
//!
//! Files are written to a `.tmp` sibling first and renamed into place.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::categorize::{CategorizedArticle, Category};
use crate::pipeline::RunReport;
use crate::relevance::PriorityLevel;

/// One persisted story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub relevance_score: f32,
    pub category: Category,
    pub priority_level: PriorityLevel,
    pub matched_keywords: Vec<String>,
    pub alternate_sources: Vec<String>,
    pub summary: Option<String>,
}

impl From<&CategorizedArticle> for ArticleRecord {
    fn from(c: &CategorizedArticle) -> Self {
        let a = &c.article.article;
        Self {
            id: c.id.clone(),
            title: a.title.clone(),
            link: a.link.clone(),
            source_name: a.source_name.clone(),
            published_at: a.published_at,
            relevance_score: c.article.relevance_score,
            category: c.category,
            priority_level: c.priority_level,
            matched_keywords: c.article.matched_keywords.iter().cloned().collect(),
            alternate_sources: c.alternate_sources.iter().map(|s| s.source_name.clone()).collect(),
            summary: a.summary_raw.clone(),
        }
    }
}

pub fn articles_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("nil_articles_{}.json", date.format("%Y%m%d")))
}

pub fn run_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("nil_run_{}.json", date.format("%Y%m%d")))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(value).context("serializing output")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Write the article array for `date`. Returns the path written.
pub fn write_articles(dir: &Path, date: NaiveDate, articles: &[CategorizedArticle]) -> Result<PathBuf> {
    let records: Vec<ArticleRecord> = articles.iter().map(ArticleRecord::from).collect();
    let path = articles_path(dir, date);
    write_json(&path, &records)?;
    tracing::info!(target: "persist", path = %path.display(), count = records.len(), "articles written");
    Ok(path)
}

/// Write the full run report for `date`. Returns the path written.
pub fn write_run(dir: &Path, date: NaiveDate, report: &RunReport) -> Result<PathBuf> {
    let path = run_path(dir, date);
    write_json(&path, report)?;
    tracing::debug!(target: "persist", path = %path.display(), "run report written");
    Ok(path)
}

/// Read back an article file.
pub fn read_articles(path: &Path) -> Result<Vec<ArticleRecord>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}
