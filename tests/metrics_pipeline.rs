// tests/metrics_pipeline.rs
use chrono::{TimeZone, Utc};
use nil_news_monitor::ingest::providers::FixtureProvider;
use nil_news_monitor::{metrics, run, LookbackWindow, MonitorConfig};

#[tokio::test]
async fn metrics_exposed_after_run() {
    // Install a local recorder for this test binary
    let handle = metrics::install_prometheus().expect("recorder");

    let cfg = MonitorConfig::from_toml_str(
        r#"
        [[sources]]
        name = "On3 NIL"
        url = "https://www.on3.com/nil/feed/"
        priority = "high"

        [[sources]]
        name = "Missing Feed"
        url = "https://missing.example/rss"
        priority = "low"
        "#,
    )
    .unwrap()
    .build()
    .unwrap();
    let window = LookbackWindow::days_before(Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap(), 7);
    let _ = run(&FixtureProvider::from_dir("tests/fixtures"), window, &cfg).await;

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    for needle in [
        metrics::SOURCES_ATTEMPTED,
        metrics::SOURCE_FAILURES,
        metrics::ARTICLES_FETCHED,
        metrics::ARTICLES_KEPT,
        metrics::FETCH_MS,
        metrics::LAST_RUN_TS,
    ] {
        assert!(out.contains(needle), "missing {needle} in:\n{out}");
    }
}
