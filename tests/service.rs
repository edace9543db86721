// tests/service.rs
//
// Wiring across service lifetimes: every restart of the service loop must
// claim ids through the one process-wide ledger.

use std::sync::Arc;
use std::time::Duration;

use reddit_digest::config::app::DEFAULT_USER_AGENT;
use reddit_digest::config::{AppConfig, Backend, RedditConfig, SummarizerConfig};
use reddit_digest::{build_service, DedupLedger};

fn app_config(dir: &tempfile::TempDir) -> AppConfig {
    AppConfig {
        telegram_token: String::new(),
        personal_chat_id: None,
        reddit: RedditConfig {
            user_agent: DEFAULT_USER_AGENT.into(),
            client_id: None,
            client_secret: None,
        },
        sources_path: dir.path().join("sources.toml"),
        prompt_path: dir.path().join("prompt.txt"),
        ledger_path: dir.path().join("seen.json"),
        interval: Duration::from_secs(3600),
        fetch_limit: 10,
        delivery_delay: Duration::ZERO,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    }
}

fn mock_ai() -> SummarizerConfig {
    SummarizerConfig {
        backend: Backend::Mock,
        api_key: String::new(),
        base_url: None,
        model: None,
        max_tokens: 4000,
        temperature: 0.7,
    }
}

#[tokio::test]
async fn restarts_share_one_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_config(&dir);
    let ledger = Arc::new(DedupLedger::load_or_empty(&app.ledger_path));

    let first = build_service(&app, &mock_ai(), ledger.clone()).unwrap();
    let second = build_service(&app, &mock_ai(), ledger.clone()).unwrap();
    assert!(Arc::ptr_eq(&first.ledger, &second.ledger));

    // an id claimed by a run of the old lifetime is not handed out again
    let (old, _) = first.ledger.claim(["x1", "x2"]);
    let (new, _) = second.ledger.claim(["x1", "x3"]);
    assert_eq!(old, vec!["x1", "x2"]);
    assert_eq!(new, vec!["x3"]);

    let on_disk = DedupLedger::load(&app.ledger_path).unwrap();
    for id in ["x1", "x2", "x3"] {
        assert!(on_disk.contains(id), "{id} persisted");
    }
}

#[tokio::test]
async fn restart_picks_up_edited_sources() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_config(&dir);
    let ledger = Arc::new(DedupLedger::load_or_empty(&app.ledger_path));

    let first = build_service(&app, &mock_ai(), ledger.clone()).unwrap();
    first.config.replace_sources(["rust"]).unwrap();

    let second = build_service(&app, &mock_ai(), ledger).unwrap();
    assert_eq!(second.config.sources(), vec!["rust"]);
}
