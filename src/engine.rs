//! # Analysis Orchestrator
//! One run = one pass over the configured sources, in configured order:
//! fetch → summarize → deliver, with every per-source failure turned into a
//! report line instead of aborting the run.
//!
//! The orchestrator holds no cross-run lock. Concurrent runs are made safe by
//! the ledger's serialized claim, so a slow summarization call can never stall
//! a timer tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::analyze::BatchSummarizer;
use crate::config::store::ConfigStore;
use crate::ingest::types::Item;
use crate::ingest::{ensure_metrics_described, SourceFetcher};
use crate::notify::{deliver_text, DeliveryChannel, DeliveryOutcome};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Timer,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Timer => f.write_str("timer"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    Analyzed {
        items_found: usize,
        /// `None` when the service answered with an empty text.
        summary: Option<String>,
        segments_sent: usize,
        segments_failed: usize,
    },
    NoNewItems,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceResult {
    pub source: String,
    pub result: RunResult,
}

impl SourceResult {
    /// One human-readable report line.
    pub fn report_line(&self) -> String {
        match &self.result {
            RunResult::Analyzed {
                items_found,
                summary,
                segments_failed,
                ..
            } => {
                let mut line = format!("✅ r/{}: {} new posts analyzed", self.source, items_found);
                if summary.is_none() {
                    line.push_str(" (empty summary)");
                }
                if *segments_failed > 0 {
                    line.push_str(&format!(", {segments_failed} segments not delivered"));
                }
                line
            }
            RunResult::NoNewItems => format!("📭 r/{}: no new posts", self.source),
            RunResult::Failed { reason } => format!("⚠️ r/{}: error: {}", self.source, reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<SourceResult>,
}

impl RunReport {
    pub fn items_found(&self) -> usize {
        self.results
            .iter()
            .map(|r| match r.result {
                RunResult::Analyzed { items_found, .. } => items_found,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.result, RunResult::Failed { .. }))
            .count()
    }

    /// One line per source followed by the completion line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.results.iter().map(SourceResult::report_line).collect();
        lines.push(self.completion_line());
        lines
    }

    pub fn completion_line(&self) -> String {
        let n = self.items_found();
        if n == 0 && self.failures() == 0 {
            return "🏁 Analysis complete: no new interesting posts.".to_string();
        }
        format!(
            "🏁 Analysis complete: {} new posts across {} sources, {} errors.",
            n,
            self.results.len(),
            self.failures()
        )
    }

    pub fn render(&self) -> String {
        let mut s = String::from("📋 **Run report**\n");
        s.push_str(&self.lines().join("\n"));
        s
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub fetch_limit: usize,
    /// Courtesy pause after each source's delivery.
    pub delivery_delay: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            fetch_limit: crate::config::app::DEFAULT_FETCH_LIMIT,
            delivery_delay: Duration::from_millis(crate::config::app::DEFAULT_DELIVERY_DELAY_MS),
        }
    }
}

/// Per-source digest message: header, summary, then the post links.
pub fn compose_source_message(source: &str, items: &[Item], summary: &str) -> String {
    let mut out = format!("📊 **r/{} digest** ({} new posts)\n\n", source, items.len());
    out.push_str(summary);
    out.push_str("\n\n🔗 Posts:\n");
    for it in items {
        out.push_str(&format!(
            "• {} (↑{} | 💬{}) {}\n",
            it.title,
            it.score,
            it.comment_count,
            it.link()
        ));
    }
    out
}

pub struct Orchestrator {
    fetcher: SourceFetcher,
    summarizer: BatchSummarizer,
    channel: Arc<dyn DeliveryChannel>,
    config: Arc<ConfigStore>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        fetcher: SourceFetcher,
        summarizer: BatchSummarizer,
        channel: Arc<dyn DeliveryChannel>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            channel,
            config,
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    /// Manual run against `target`.
    pub async fn run(&self, target: &str) -> RunReport {
        self.run_with(target, Trigger::Manual).await
    }

    pub async fn run_with(&self, target: &str, trigger: Trigger) -> RunReport {
        ensure_metrics_described();
        counter!("digest_runs_total").increment(1);
        let started_at = Utc::now();
        let sources = self.config.sources();
        tracing::info!(%trigger, chat = target, sources = sources.len(), "run started");

        let listing = sources
            .iter()
            .map(|s| format!("r/{s}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.deliver(target, &format!("🔍 **Starting analysis**\n\nSources: {listing}"))
            .await;

        let mut results = Vec::with_capacity(sources.len());
        for source in &sources {
            let result = self.run_source(target, source).await;
            tracing::info!(source = %source, result = ?result, "source done");
            results.push(SourceResult {
                source: source.clone(),
                result,
            });
        }

        let report = RunReport {
            target: target.to_string(),
            trigger,
            started_at,
            finished_at: Utc::now(),
            results,
        };
        self.deliver(target, &report.render()).await;

        gauge!("digest_last_run_ts").set(report.finished_at.timestamp() as f64);
        tracing::info!(
            %trigger,
            chat = target,
            items = report.items_found(),
            failures = report.failures(),
            "run finished"
        );
        report
    }

    async fn run_source(&self, target: &str, source: &str) -> RunResult {
        let items = match self.fetcher.try_fetch(source, self.settings.fetch_limit).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(source, error = %e, "provider error, skipping source");
                return RunResult::Failed {
                    reason: e.to_string(),
                };
            }
        };
        if items.is_empty() {
            return RunResult::NoNewItems;
        }

        let summary = match self.summarizer.summarize(&items).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(source, items = items.len(), error = %e, "summarization failed");
                return RunResult::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let Some(text) = summary.as_deref() else {
            return RunResult::Analyzed {
                items_found: items.len(),
                summary: None,
                segments_sent: 0,
                segments_failed: 0,
            };
        };

        let message = compose_source_message(source, &items, text);
        let DeliveryOutcome { sent, failed } = self.deliver(target, &message).await;
        if !self.settings.delivery_delay.is_zero() {
            tokio::time::sleep(self.settings.delivery_delay).await;
        }

        RunResult::Analyzed {
            items_found: items.len(),
            summary,
            segments_sent: sent,
            segments_failed: failed,
        }
    }

    async fn deliver(&self, target: &str, text: &str) -> DeliveryOutcome {
        deliver_text(self.channel.as_ref(), target, text).await
    }
}
