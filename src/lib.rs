// src/lib.rs
// Public library surface for the binary, the demo and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::analyze::BatchSummarizer;
pub use crate::config::store::ConfigStore;
pub use crate::engine::{Orchestrator, RunReport, RunResult, Trigger};
pub use crate::ingest::ledger::DedupLedger;
pub use crate::ingest::SourceFetcher;
pub use crate::notify::DeliveryChannel;
pub use crate::scheduler::Scheduler;

use std::sync::Arc;

use anyhow::Context;

use crate::analyze::ai_adapter::{build_service_from_config, DynSummarizer};
use crate::config::{AppConfig, SummarizerConfig};
use crate::engine::RunSettings;
use crate::history::RunHistory;
use crate::ingest::providers::RedditProvider;
use crate::notify::{LogChannel, TelegramChannel, TELEGRAM_MAX_LEN};

/// Fully wired components for one service lifetime.
pub struct Service {
    pub scheduler: Scheduler,
    pub config: Arc<ConfigStore>,
    pub ledger: Arc<DedupLedger>,
}

/// Reload the source list and prompt and build every component around the
/// process-wide `ledger`. Called once per (re)start of the service loop.
///
/// The ledger is passed in rather than reloaded: runs left over from an
/// earlier lifetime must keep claiming ids through the same instance.
pub fn build_service(
    app: &AppConfig,
    ai: &SummarizerConfig,
    ledger: Arc<DedupLedger>,
) -> anyhow::Result<Service> {
    let config = Arc::new(
        ConfigStore::load_or_init(&app.sources_path, &app.prompt_path)
            .context("loading source list / prompt")?,
    );
    tracing::info!(
        sources = config.sources().len(),
        seen_items = ledger.len(),
        ledger = %ledger.path().display(),
        "state loaded"
    );

    let provider = Arc::new(RedditProvider::new(&app.reddit)?);
    let service: DynSummarizer =
        build_service_from_config(ai).context("building summarization backend")?;
    // Safe diagnostics: only backend + key presence
    tracing::info!(
        backend = service.backend_name(),
        key_len = ai.api_key.len(),
        "summarizer ready"
    );

    let channel: Arc<dyn DeliveryChannel> = if app.telegram_token.is_empty() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set, deliveries go to the log only");
        Arc::new(LogChannel::new(TELEGRAM_MAX_LEN))
    } else {
        Arc::new(TelegramChannel::new(app.telegram_token.clone())?)
    };

    let fetcher = SourceFetcher::new(provider, ledger.clone());
    let summarizer = BatchSummarizer::new(service, config.clone());
    let orchestrator = Orchestrator::new(fetcher, summarizer, channel, config.clone())
        .with_settings(RunSettings {
            fetch_limit: app.fetch_limit,
            delivery_delay: app.delivery_delay,
        });
    let scheduler = Scheduler::new(Arc::new(orchestrator), Arc::new(RunHistory::with_capacity(50)));

    Ok(Service {
        scheduler,
        config,
        ledger,
    })
}
