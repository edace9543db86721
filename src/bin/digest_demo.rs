//! Offline demo: one run over fixture posts with the mock summarizer; the
//! log channel prints every segment instead of calling Telegram.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use reddit_digest::analyze::ai_adapter::MockService;
use reddit_digest::engine::RunSettings;
use reddit_digest::ingest::providers::FixtureProvider;
use reddit_digest::ingest::types::{RawComment, RawItem};
use reddit_digest::notify::{LogChannel, TELEGRAM_MAX_LEN};
use reddit_digest::{BatchSummarizer, ConfigStore, DedupLedger, Orchestrator, SourceFetcher};

fn post(id: &str, title: &str, score: i64) -> RawItem {
    RawItem {
        id: id.into(),
        title: title.into(),
        body: "Some body text for the demo post.".into(),
        url: format!("https://example.org/{id}"),
        score,
        comment_count: 4,
        created_at: Utc::now() - ChronoDuration::hours(1),
        permalink: format!("/r/rust/comments/{id}/"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let dir = std::env::temp_dir().join("reddit-digest-demo");

    let provider = FixtureProvider::new()
        .with_items(
            "rust",
            vec![post("d1", "Async closures land", 120), post("d2", "Borrowck tips", 40)],
        )
        .with_comments(
            "d1",
            vec![RawComment {
                author: "ferris".into(),
                body: "Finally, this makes callback APIs much nicer.".into(),
                score: 33,
            }],
        )
        .failing("flaky");

    let config = Arc::new(ConfigStore::load_or_init(
        dir.join("sources.toml"),
        dir.join("prompt.txt"),
    )?);
    config.replace_sources(["rust", "flaky", "empty"])?;
    let ledger = Arc::new(DedupLedger::load(dir.join("seen.json"))?);

    let orchestrator = Orchestrator::new(
        SourceFetcher::new(Arc::new(provider), ledger),
        BatchSummarizer::new(
            Arc::new(MockService::fixed("**Key Insights**\n- async closures\n- borrowck")),
            config.clone(),
        ),
        Arc::new(LogChannel::new(TELEGRAM_MAX_LEN)),
        config,
    )
    .with_settings(RunSettings {
        fetch_limit: 10,
        delivery_delay: Duration::from_millis(200),
    });

    let report = orchestrator.run("demo-chat").await;
    for line in report.lines() {
        println!("{line}");
    }
    println!("digest-demo done (run it twice: the second run finds no new posts)");
    Ok(())
}
