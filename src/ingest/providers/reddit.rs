// src/ingest/providers/reddit.rs
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::histogram;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::app::RedditConfig;
use crate::error::ProviderError;
use crate::ingest::types::{RawComment, RawItem, SourceProvider};

const PUBLIC_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    created_utc: f64,
    permalink: String,
    #[serde(default)]
    stickied: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResp {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    valid_until: Instant,
}

/// Reddit JSON API provider. Uses app-only OAuth when client credentials are
/// configured, the public `.json` endpoints otherwise.
pub struct RedditProvider {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    token: Mutex<Option<CachedToken>>,
}

impl RedditProvider {
    pub fn new(cfg: &RedditConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building reddit http client")?;
        let credentials = match (&cfg.client_id, &cfg.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.clone(), secret.clone()))
            }
            _ => None,
        };
        Ok(Self {
            http,
            credentials,
            token: Mutex::new(None),
        })
    }

    fn base(&self) -> &'static str {
        if self.credentials.is_some() {
            OAUTH_BASE
        } else {
            PUBLIC_BASE
        }
    }

    async fn bearer(&self) -> Result<Option<String>, ProviderError> {
        let Some((id, secret)) = &self.credentials else {
            return Ok(None);
        };
        let mut g = self.token.lock().await;
        if let Some(t) = g.as_ref() {
            if t.valid_until > Instant::now() {
                return Ok(Some(t.value.clone()));
            }
        }
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(id, Some(secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::Auth(format!(
                "token endpoint answered {}",
                resp.status()
            )));
        }
        let body: TokenResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;
        let ttl = body.expires_in.saturating_sub(60).max(60);
        let value = body.access_token;
        *g = Some(CachedToken {
            value: value.clone(),
            valid_until: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(Some(value))
    }

    async fn get_text(&self, source: &str, url: &str) -> Result<String, ProviderError> {
        let mut req = self.http.get(url);
        if let Some(token) = self.bearer().await? {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|err| ProviderError::Http {
            source_name: source.to_string(),
            err,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                source_name: source.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|err| ProviderError::Http {
            source_name: source.to_string(),
            err,
        })
    }
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn list_hot_items(
        &self,
        source: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        let t0 = std::time::Instant::now();
        let url = format!("{}/r/{}/hot.json?limit={}&raw_json=1", self.base(), source, limit);
        let body = self.get_text(source, &url).await?;
        let mut items = parse_hot_listing(source, &body)?;
        items.truncate(limit);
        histogram!("digest_provider_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(items)
    }

    async fn comments(
        &self,
        source: &str,
        item: &RawItem,
        limit: usize,
    ) -> Result<Vec<RawComment>, ProviderError> {
        let url = format!(
            "{}/comments/{}.json?limit={}&sort=top&raw_json=1",
            self.base(),
            item.id,
            limit
        );
        let body = self.get_text(source, &url).await?;
        parse_comments(source, &body, limit)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

/// Parse a `/r/{name}/hot.json` listing. Stickied posts are skipped.
pub fn parse_hot_listing(source: &str, body: &str) -> Result<Vec<RawItem>, ProviderError> {
    let listing: Listing<Post> =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
            source_name: source.to_string(),
            reason: e.to_string(),
        })?;
    let out = listing
        .data
        .children
        .into_iter()
        .filter(|t| t.kind == "t3" && !t.data.stickied)
        .filter_map(|t| {
            let p = t.data;
            let created_at = Utc.timestamp_opt(p.created_utc as i64, 0).single()?;
            Some(RawItem {
                id: p.id,
                title: p.title,
                body: p.selftext,
                url: p.url,
                score: p.score,
                comment_count: p.num_comments,
                created_at,
                permalink: p.permalink,
            })
        })
        .collect();
    Ok(out)
}

/// Parse a `/comments/{id}.json` response, flattening the reply tree
/// depth-first. "more" stubs are skipped; at most `limit` comments return.
pub fn parse_comments(
    source: &str,
    body: &str,
    limit: usize,
) -> Result<Vec<RawComment>, ProviderError> {
    let v: Value = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        source_name: source.to_string(),
        reason: e.to_string(),
    })?;
    let listing = v
        .as_array()
        .and_then(|a| a.get(1))
        .ok_or_else(|| ProviderError::Malformed {
            source_name: source.to_string(),
            reason: "comments response is not a [post, comments] pair".into(),
        })?;
    let mut out = Vec::new();
    walk_comments(listing, limit, &mut out);
    Ok(out)
}

fn walk_comments(listing: &Value, limit: usize, out: &mut Vec<RawComment>) {
    let Some(children) = listing
        .pointer("/data/children")
        .and_then(Value::as_array)
    else {
        return;
    };
    for child in children {
        if out.len() >= limit {
            return;
        }
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else {
            continue;
        };
        out.push(RawComment {
            author: data
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            body: data
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
        });
        // `replies` is "" when empty, a listing otherwise
        if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
            walk_comments(replies, limit, out);
        }
    }
}
