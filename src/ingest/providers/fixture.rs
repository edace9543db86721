// src/ingest/providers/fixture.rs
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::ingest::types::{RawComment, RawItem, SourceProvider};

/// In-memory provider for tests and offline demo runs.
#[derive(Default)]
pub struct FixtureProvider {
    items: HashMap<String, Vec<RawItem>>,
    comments: HashMap<String, Vec<RawComment>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items served for `source` (same list on every call).
    pub fn with_items(mut self, source: &str, items: Vec<RawItem>) -> Self {
        self.items.insert(source.to_string(), items);
        self
    }

    pub fn with_comments(mut self, item_id: &str, comments: Vec<RawComment>) -> Self {
        self.comments.insert(item_id.to_string(), comments);
        self
    }

    /// Listing `source` fails with [`ProviderError::Unavailable`].
    pub fn failing(mut self, source: &str) -> Self {
        self.failing.insert(source.to_string());
        self
    }

    /// Sources listed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl SourceProvider for FixtureProvider {
    async fn list_hot_items(
        &self,
        source: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(source.to_string());
        if self.failing.contains(source) {
            return Err(ProviderError::Unavailable(source.to_string()));
        }
        Ok(self
            .items
            .get(source)
            .map(|v| v.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn comments(
        &self,
        _source: &str,
        item: &RawItem,
        limit: usize,
    ) -> Result<Vec<RawComment>, ProviderError> {
        Ok(self
            .comments
            .get(&item.id)
            .map(|v| v.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
