//! NIL News Monitor: binary entrypoint
//! Loads config, fetches every feed, runs the pipeline and writes the dated
//! data files.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nil_news_monitor::cli::Cli;
use nil_news_monitor::config;
use nil_news_monitor::ingest::providers::{FixtureProvider, HttpFeedProvider};
use nil_news_monitor::ingest::types::{FeedProvider, LookbackWindow};
use nil_news_monitor::{metrics, persist, pipeline};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let prometheus = match &cli.metrics_out {
        Some(_) => Some(metrics::install_prometheus()?),
        None => None,
    };

    // Config errors abort before any network activity.
    let raw = match &cli.config {
        Some(p) => config::load_from(p),
        None => config::load_default(),
    }
    .context("loading monitor config")?;
    let cfg = raw.build().context("validating monitor config")?;

    let provider: Box<dyn FeedProvider> = match &cli.fixture_dir {
        Some(dir) => Box::new(FixtureProvider::from_dir(dir)),
        None => Box::new(HttpFeedProvider::new(&cfg.fetch).context("building http client")?),
    };

    let now = chrono::Utc::now();
    let window = LookbackWindow::days_before(now, cli.days);
    let report = pipeline::run(provider.as_ref(), window, &cfg).await;

    if !cli.no_persist {
        let date = now.date_naive();
        persist::write_articles(&cli.data_dir, date, &report.result.articles)?;
        persist::write_run(&cli.data_dir, date, &report)?;
    }

    for (rank, a) in report.result.articles.iter().take(cli.top).enumerate() {
        tracing::info!(
            rank = rank + 1,
            score = f64::from(a.article.relevance_score),
            category = %a.category,
            source = %a.article.article.source_name,
            title = %a.article.article.title,
            "top story"
        );
    }

    if let (Some(handle), Some(path)) = (prometheus, &cli.metrics_out) {
        std::fs::write(path, handle.render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    Ok(())
}
