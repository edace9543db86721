// src/analyze/mod.rs
//! Batch summarization: one prompt per source batch, sent with the configured
//! analysis prompt as the instruction.

pub mod ai_adapter;

use std::fmt::Write as _;
use std::sync::Arc;

use metrics::{counter, histogram};

use crate::config::store::ConfigStore;
use crate::error::SummarizationError;
use crate::ingest::types::{Comment, Item};

pub use ai_adapter::{DynSummarizer, SummarizationService};

pub const TOP_COMMENTS: usize = 8;
pub const EMPTY_BODY_PLACEHOLDER: &str = "No text content (link post)";

/// Render the batch text sent as user content.
pub fn build_batch_content(items: &[Item]) -> String {
    let mut out = String::from("CONTENT TO ANALYZE:\n");
    for (n, item) in items.iter().enumerate() {
        let body = if item.body.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER
        } else {
            item.body.as_str()
        };
        let _ = write!(
            out,
            "\n=== POST {} of {} ===\n\
             POST TITLE: {}\n\
             SUBREDDIT: r/{}\n\
             SCORE: {} upvotes | {} comments\n\
             TIME: {}\n\
             LINK: {}\n\n\
             POST CONTENT:\n{}\n\n\
             TOP COMMENTS:\n",
            n + 1,
            items.len(),
            item.title,
            item.source,
            item.score,
            item.comment_count,
            item.created_at.format("%Y-%m-%d %H:%M UTC"),
            item.link(),
            body,
        );
        let top = top_comments(&item.comments, TOP_COMMENTS);
        if top.is_empty() {
            out.push_str("(none)\n");
        }
        for (i, c) in top.iter().enumerate() {
            let _ = writeln!(out, "{}. [↑{}] u/{}: {}", i + 1, c.score, c.author, c.body);
        }
    }
    out
}

/// Highest score first; equal scores keep provider order.
pub fn top_comments(comments: &[Comment], n: usize) -> Vec<&Comment> {
    let mut sorted: Vec<&Comment> = comments.iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));
    sorted.truncate(n);
    sorted
}

#[derive(Clone)]
pub struct BatchSummarizer {
    service: DynSummarizer,
    config: Arc<ConfigStore>,
}

impl BatchSummarizer {
    pub fn new(service: DynSummarizer, config: Arc<ConfigStore>) -> Self {
        Self { service, config }
    }

    pub fn backend_name(&self) -> &'static str {
        self.service.backend_name()
    }

    /// `Ok(None)` for an empty batch (service not called) or an empty answer.
    pub async fn summarize(&self, items: &[Item]) -> Result<Option<String>, SummarizationError> {
        if items.is_empty() {
            return Ok(None);
        }
        let prompt = self.config.prompt();
        let content = build_batch_content(items);

        let t0 = std::time::Instant::now();
        let res = self.service.complete(&prompt, &content).await;
        histogram!("digest_summarize_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!(backend = self.backend_name(), "empty summary");
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            Err(e) => {
                counter!("digest_summarize_errors_total").increment(1);
                Err(e)
            }
        }
    }
}
