//! reddit-digest binary entrypoint.
//! Boots the timer, the admin HTTP surface and the supervising restart loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reddit_digest::api::{self, AppState};
use reddit_digest::config::app::DEFAULT_LEDGER_PATH;
use reddit_digest::config::{AppConfig, SummarizerConfig};
use reddit_digest::metrics::Metrics;
use reddit_digest::DedupLedger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BACKOFF_START: Duration = Duration::from_secs(5);
const BACKOFF_MAX: Duration = Duration::from_secs(300);

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reddit_digest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

/// One service lifetime. Returns Ok on Ctrl-C, Err on anything that should
/// make the supervisor restart us.
async fn run_service(metrics: &Metrics, ledger: Arc<DedupLedger>) -> anyhow::Result<()> {
    let app = AppConfig::from_env()?;
    let ai = SummarizerConfig::load_default().context("loading summarizer config")?;
    let service = reddit_digest::build_service(&app, &ai, ledger)?;

    // Dropped on every return path below, which stops the timer.
    let _timer = match &app.personal_chat_id {
        Some(chat) => Some(service.scheduler.spawn_timer(app.interval, chat.clone())),
        None => {
            tracing::warn!("PERSONAL_CHAT_ID not set - scheduled analysis disabled");
            None
        }
    };

    let state = AppState {
        scheduler: service.scheduler.clone(),
        config: service.config.clone(),
        ledger: service.ledger.clone(),
        default_target: app.personal_chat_id.clone(),
    };
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(app.bind_addr)
        .await
        .with_context(|| format!("binding {}", app.bind_addr))?;
    tracing::info!(addr = %app.bind_addr, "admin surface listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let boot = AppConfig::from_env().ok();
    let interval_secs = boot.as_ref().map(|c| c.interval.as_secs()).unwrap_or_default();
    let metrics = Metrics::init(interval_secs)?;

    // One ledger for the whole process; restarts reuse it.
    let ledger_path = boot
        .map(|c| c.ledger_path)
        .unwrap_or_else(|| DEFAULT_LEDGER_PATH.into());
    let ledger = Arc::new(DedupLedger::load_or_empty(ledger_path));

    let mut backoff = BACKOFF_START;
    loop {
        match run_service(&metrics, ledger.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, backoff_secs = backoff.as_secs(), "service crashed, restarting");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        }
    }
}
