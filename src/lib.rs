// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod categorize;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod registry;
pub mod relevance;
pub mod source_weights;

// ---- Re-exports for stable public API ----
pub use crate::categorize::{CategorizedArticle, Category, Categorizer};
pub use crate::config::MonitorConfig;
pub use crate::error::{ConfigError, FetchError, ParseError};
pub use crate::ingest::types::{Article, FeedProvider, LookbackWindow};
pub use crate::pipeline::{process, run, PipelineConfig, PipelineResult, RunReport, RunStatus};
