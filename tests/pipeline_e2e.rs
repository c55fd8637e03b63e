// tests/pipeline_e2e.rs
use chrono::{TimeZone, Utc};
use std::time::Duration;

use nil_news_monitor::ingest::fetch_all;
use nil_news_monitor::ingest::providers::FixtureProvider;
use nil_news_monitor::{process, run, Category, LookbackWindow, MonitorConfig, PipelineConfig, RunStatus};

const REGISTRY: &str = r#"
[[sources]]
name = "On3 NIL"
url = "https://www.on3.com/nil/feed/"
priority = "high"

[[sources]]
name = "Sportico College"
url = "https://www.sportico.com/business/college-sports/feed/"
priority = "medium"

[[sources]]
name = "Front Office Sports"
url = "https://frontofficesports.com/feed/"
priority = "low"

[[sources]]
name = "NIL Wire"
url = "https://nilwire.example/feed"
priority = "medium"

[fetch]
concurrency = 2
timeout_secs = 5
"#;

fn cfg() -> PipelineConfig {
    std::env::remove_var("NIL_MIN_SCORE");
    MonitorConfig::from_toml_str(REGISTRY).unwrap().build().unwrap()
}

fn window() -> LookbackWindow {
    LookbackWindow::days_before(Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap(), 7)
}

fn provider() -> FixtureProvider {
    FixtureProvider::from_dir("tests/fixtures")
}

#[tokio::test]
async fn fixture_run_counts_every_stage() {
    let report = run(&provider(), window(), &cfg()).await;
    let r = &report.result;

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.warnings.is_empty());
    assert_eq!(r.sources_attempted, 4);
    assert!(r.sources_failed.is_empty());
    assert_eq!(r.total_fetched, 10);
    assert_eq!(r.total_after_filter, 8);
    assert_eq!(r.total_after_dedup, 7);
    assert_eq!(r.total_categorized, 7);
    assert_eq!(r.parse_errors, 1);
    assert_eq!(r.undated_sources, vec!["NIL Wire".to_string()]);

    // ranked by score, descending
    let scores: Vec<f32> = r.articles.iter().map(|a| a.article.relevance_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
    assert!(r.articles.iter().all(|a| Category::ALL.contains(&a.category)));
}

#[tokio::test]
async fn star_qb_story_collapses_onto_high_priority_source() {
    let report = run(&provider(), window(), &cfg()).await;
    let qb: Vec<_> = report
        .result
        .articles
        .iter()
        .filter(|a| a.article.article.title.to_lowercase().contains("star qb"))
        .collect();

    assert_eq!(qb.len(), 1);
    let story = qb[0];
    assert_eq!(story.article.article.source_name, "On3 NIL");
    assert_eq!(story.category, Category::MegaDeal);
    assert_eq!(story.alternate_sources.len(), 1);
    assert_eq!(story.alternate_sources[0].source_name, "Front Office Sports");
    // strongest story of the week
    assert_eq!(report.result.articles[0].id, story.id);
}

#[tokio::test]
async fn categories_follow_rule_precedence() {
    let report = run(&provider(), window(), &cfg()).await;
    let category_of = |needle: &str| {
        report
            .result
            .articles
            .iter()
            .find(|a| a.article.article.title.contains(needle))
            .map(|a| a.category)
            .unwrap_or_else(|| panic!("no article containing {needle:?}"))
    };
    // breaking beats mega_deal ("record") and legal ("settlement")
    assert_eq!(category_of("House settlement"), Category::Breaking);
    assert_eq!(category_of("disclosure policy"), Category::Policy);
    assert_eq!(category_of("Booster NIL collective"), Category::Collective);
    assert_eq!(category_of("Opendorse"), Category::Platform);
    assert_eq!(category_of("Podcast"), Category::General);
}

#[tokio::test]
async fn slow_source_times_out_without_sinking_the_run() {
    let mut cfg = cfg();
    cfg.fetch.timeout_secs = 1;
    let slow = provider().with_delay("Sportico College", Duration::from_secs(3));

    let report = run(&slow, window(), &cfg).await;
    let r = &report.result;

    assert_eq!(report.status, RunStatus::QualifiedSuccess);
    assert_eq!(r.sources_failed.len(), 1);
    assert!(r.sources_failed["Sportico College"].contains("timed out"));
    assert!(r
        .articles
        .iter()
        .all(|a| a.article.article.source_name != "Sportico College"));
    for name in ["On3 NIL", "Front Office Sports", "NIL Wire"] {
        assert!(
            r.articles.iter().any(|a| a.article.article.source_name == name),
            "{name} missing"
        );
    }
}

#[tokio::test]
async fn broken_and_failing_sources_are_isolated() {
    let cfg = cfg();
    let p = provider()
        .with_body("NIL Wire", &std::fs::read_to_string("tests/fixtures/broken.xml").unwrap())
        .with_failure("Front Office Sports", "connection reset");

    let report = run(&p, window(), &cfg).await;
    let failed = &report.result.sources_failed;
    assert_eq!(failed.len(), 2);
    assert!(failed["NIL Wire"].contains("unrecognized feed root"));
    assert!(failed["Front Office Sports"].contains("connection reset"));
    // Without FOS the Star QB story has no alternates left.
    assert!(report.result.articles[0].alternate_sources.is_empty());
}

#[tokio::test]
async fn run_budget_cuts_off_pending_sources() {
    let mut cfg = cfg();
    cfg.fetch.timeout_secs = 30;
    cfg.fetch.run_budget_secs = Some(1);
    let p = provider().with_delay("NIL Wire", Duration::from_secs(5));

    let report = run(&p, window(), &cfg).await;
    let failed = &report.result.sources_failed;
    assert_eq!(failed.len(), 1);
    assert!(failed["NIL Wire"].contains("run budget"));
    assert_eq!(report.result.sources_attempted, 4);
    assert!(report.timings.fetch_ms < 5_000);
}

#[tokio::test]
async fn all_sources_failing_is_an_empty_but_valid_run() {
    let p = FixtureProvider::new();
    let report = run(&p, window(), &cfg()).await;
    assert_eq!(report.status, RunStatus::Empty);
    assert!(report.result.is_empty());
    assert_eq!(report.result.sources_failed.len(), 4);
    assert_eq!(report.result.total_fetched, 0);
}

#[tokio::test]
async fn processing_is_idempotent_over_the_same_fetch() {
    let cfg = cfg();
    let outcomes = fetch_all(&provider(), &cfg.sources, &window(), &cfg.fetch).await;
    let names: Vec<_> = outcomes.iter().map(|o| o.source_name.as_str()).collect();
    assert_eq!(names, ["On3 NIL", "Sportico College", "Front Office Sports", "NIL Wire"]);

    let first = process(&outcomes, &window(), &cfg);
    let second = process(&outcomes, &window(), &cfg);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
