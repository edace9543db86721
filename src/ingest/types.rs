// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::ProviderError;

/// Candidate post as returned by a provider, before any filtering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub score: i64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub permalink: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawComment {
    pub author: String,
    pub body: String,
    pub score: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub body: String, // bounded
    pub score: i64,
}

/// A post accepted into a batch. Lives for one run only; the ledger keeps its id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: String, // bounded
    pub url: String,
    pub score: i64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub permalink: String,
    pub comments: Vec<Comment>,
}

impl Item {
    /// Absolute link to the post.
    pub fn link(&self) -> String {
        if self.permalink.starts_with("http") {
            self.permalink.clone()
        } else {
            format!("https://reddit.com{}", self.permalink)
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Up to `limit` hot items of `source`, provider order.
    async fn list_hot_items(
        &self,
        source: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError>;

    /// Comments of one item, provider order.
    async fn comments(
        &self,
        source: &str,
        item: &RawItem,
        limit: usize,
    ) -> Result<Vec<RawComment>, ProviderError>;

    fn name(&self) -> &'static str;
}
