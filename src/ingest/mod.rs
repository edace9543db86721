// src/ingest/mod.rs
pub mod config;
pub mod ledger;
pub mod providers;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::error::ProviderError;
use crate::ingest::ledger::DedupLedger;
use crate::ingest::types::{Comment, Item, RawComment, RawItem, SourceProvider};

/// Comment bodies equal to one of these are provider tombstones.
pub const REMOVED_SENTINELS: &[&str] = &["[deleted]", "[removed]"];

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Orchestration runs started.");
        describe_counter!(
            "digest_items_fetched_total",
            "Items accepted into a batch (claimed in the ledger)."
        );
        describe_counter!(
            "digest_items_seen_total",
            "Candidates skipped because the ledger already had them."
        );
        describe_counter!(
            "digest_items_filtered_total",
            "Candidates dropped by staleness or engagement filters."
        );
        describe_counter!(
            "digest_provider_errors_total",
            "Source provider listing/comment errors."
        );
        describe_counter!(
            "digest_summarize_errors_total",
            "Summarization service failures."
        );
        describe_counter!(
            "digest_delivery_errors_total",
            "Segments rejected by the delivery channel."
        );
        describe_counter!("digest_segments_sent_total", "Segments delivered.");
        describe_gauge!("digest_ledger_size", "Ids currently held by the dedup ledger.");
        describe_gauge!("digest_last_run_ts", "Unix ts when the last run finished.");
        describe_histogram!("digest_summarize_ms", "Summarization latency in milliseconds.");
        describe_histogram!(
            "digest_provider_fetch_ms",
            "Provider listing latency in milliseconds."
        );
    });
}

/// Noise filter and prompt-size bounds applied per source.
#[derive(Clone, Debug)]
pub struct FetchPolicy {
    pub staleness: ChronoDuration,
    /// Keep items with `score > min_score` ...
    pub min_score: i64,
    /// ... or `comment_count > min_comments`.
    pub min_comments: u64,
    pub comment_cap: usize,
    pub comment_max_chars: usize,
    pub body_max_chars: usize,
    /// Comments must be strictly longer than this.
    pub comment_min_chars: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            staleness: ChronoDuration::hours(24),
            min_score: 5,
            min_comments: 2,
            comment_cap: 15,
            comment_max_chars: 800,
            body_max_chars: 1000,
            comment_min_chars: 10,
        }
    }
}

/// Counters describing what `select_candidates` dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub seen: usize,
    pub stale: usize,
    pub low_engagement: usize,
}

/// Truncate to at most `max` chars (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Decode entities and trim; line structure is kept.
pub fn clean_text(s: &str) -> String {
    html_escape::decode_html_entities(s).trim().to_string()
}

/// Pure candidate filter: drops ids already in the ledger, stale items and
/// low-engagement items. Provider order is preserved.
pub fn select_candidates<F>(
    now: DateTime<Utc>,
    raw: Vec<RawItem>,
    is_seen: F,
    policy: &FetchPolicy,
) -> (Vec<RawItem>, FilterStats)
where
    F: Fn(&str) -> bool,
{
    let mut stats = FilterStats::default();
    let mut keep = Vec::with_capacity(raw.len());
    for it in raw {
        if is_seen(&it.id) {
            stats.seen += 1;
            continue;
        }
        if now.signed_duration_since(it.created_at) > policy.staleness {
            stats.stale += 1;
            continue;
        }
        if !(it.score > policy.min_score || it.comment_count > policy.min_comments) {
            stats.low_engagement += 1;
            continue;
        }
        keep.push(it);
    }
    (keep, stats)
}

/// Cap, drop tombstones and short comments, bound the body length.
pub fn filter_comments(raw: Vec<RawComment>, policy: &FetchPolicy) -> Vec<Comment> {
    raw.into_iter()
        .take(policy.comment_cap)
        .filter_map(|c| {
            let body = clean_text(&c.body);
            if REMOVED_SENTINELS.contains(&body.as_str())
                || body.chars().count() <= policy.comment_min_chars
            {
                return None;
            }
            Some(Comment {
                author: if c.author.trim().is_empty() {
                    "Unknown".to_string()
                } else {
                    c.author
                },
                body: truncate_chars(&body, policy.comment_max_chars),
                score: c.score,
            })
        })
        .collect()
}

/// Pulls candidates for one source, filters them and claims the survivors in
/// the ledger before anything downstream sees them.
#[derive(Clone)]
pub struct SourceFetcher {
    provider: Arc<dyn SourceProvider>,
    ledger: Arc<DedupLedger>,
    policy: FetchPolicy,
}

impl SourceFetcher {
    pub fn new(provider: Arc<dyn SourceProvider>, ledger: Arc<DedupLedger>) -> Self {
        Self {
            provider,
            ledger,
            policy: FetchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    /// Fail-soft fetch: provider errors are logged and yield an empty batch.
    pub async fn fetch(&self, source: &str, limit: usize) -> Vec<Item> {
        match self.try_fetch(source, limit).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(source, error = %e, "fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn try_fetch(&self, source: &str, limit: usize) -> Result<Vec<Item>, ProviderError> {
        self.try_fetch_at(source, limit, Utc::now()).await
    }

    /// Same as [`SourceFetcher::try_fetch`] with an explicit retrieval time.
    pub async fn try_fetch_at(
        &self,
        source: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Item>, ProviderError> {
        ensure_metrics_described();

        let raw = match self.provider.list_hot_items(source, limit).await {
            Ok(v) => v,
            Err(e) => {
                counter!("digest_provider_errors_total").increment(1);
                return Err(e);
            }
        };
        let total = raw.len();

        let (candidates, stats) =
            select_candidates(now, raw, |id| self.ledger.contains(id), &self.policy);

        // Claim atomically; a concurrent run may have taken some ids meanwhile.
        let (claimed, persist_err) = self.ledger.claim(candidates.iter().map(|c| c.id.as_str()));
        if let Some(e) = persist_err {
            tracing::error!(source, error = %e, "ledger persist failed, kept in memory");
        }

        let mut items = Vec::with_capacity(claimed.len());
        for raw in candidates.into_iter().filter(|c| claimed.contains(&c.id)) {
            let comments = match self
                .provider
                .comments(source, &raw, self.policy.comment_cap)
                .await
            {
                Ok(v) => filter_comments(v, &self.policy),
                Err(e) => {
                    counter!("digest_provider_errors_total").increment(1);
                    tracing::warn!(source, item = %raw.id, error = %e, "comments unavailable");
                    Vec::new()
                }
            };
            items.push(Item {
                body: truncate_chars(&clean_text(&raw.body), self.policy.body_max_chars),
                id: raw.id,
                title: clean_text(&raw.title),
                url: raw.url,
                score: raw.score,
                comment_count: raw.comment_count,
                created_at: raw.created_at,
                source: source.to_string(),
                permalink: raw.permalink,
                comments,
            });
        }

        counter!("digest_items_seen_total").increment(stats.seen as u64);
        counter!("digest_items_filtered_total")
            .increment((stats.stale + stats.low_engagement) as u64);
        counter!("digest_items_fetched_total").increment(items.len() as u64);

        tracing::info!(
            target: "ingest",
            provider = self.provider.name(),
            source,
            candidates = total,
            seen = stats.seen,
            stale = stats.stale,
            low_engagement = stats.low_engagement,
            kept = items.len(),
            "source fetched"
        );
        Ok(items)
    }
}
