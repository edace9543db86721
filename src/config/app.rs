// src/config/app.rs
//! Process settings read from the environment (after `dotenvy`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const DEFAULT_PROMPT_PATH: &str = "config/prompt.txt";
pub const DEFAULT_LEDGER_PATH: &str = "state/seen_items.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 2 * 3600;
pub const DEFAULT_FETCH_LIMIT: usize = 10;
pub const DEFAULT_DELIVERY_DELAY_MS: u64 = 2000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_USER_AGENT: &str = "RedditAnalyzerBot/1.0";

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub user_agent: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    /// Target of timer-driven runs; timer is off when unset.
    pub personal_chat_id: Option<String>,
    pub reddit: RedditConfig,
    pub sources_path: PathBuf,
    pub prompt_path: PathBuf,
    pub ledger_path: PathBuf,
    pub interval: Duration,
    pub fetch_limit: usize,
    pub delivery_delay: Duration,
    pub bind_addr: SocketAddr,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_raw = env_opt("DIGEST_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("invalid DIGEST_BIND_ADDR {bind_raw}"))?;

        Ok(Self {
            telegram_token: env_opt("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            personal_chat_id: env_opt("PERSONAL_CHAT_ID"),
            reddit: RedditConfig {
                user_agent: env_opt("REDDIT_USER_AGENT")
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
                client_id: env_opt("REDDIT_CLIENT_ID"),
                client_secret: env_opt("REDDIT_CLIENT_SECRET"),
            },
            sources_path: env_opt("DIGEST_SOURCES_PATH")
                .unwrap_or_else(|| DEFAULT_SOURCES_PATH.into())
                .into(),
            prompt_path: env_opt("DIGEST_PROMPT_PATH")
                .unwrap_or_else(|| DEFAULT_PROMPT_PATH.into())
                .into(),
            ledger_path: env_opt("DIGEST_LEDGER_PATH")
                .unwrap_or_else(|| DEFAULT_LEDGER_PATH.into())
                .into(),
            interval: Duration::from_secs(
                env_parse("DIGEST_INTERVAL_SECS", DEFAULT_INTERVAL_SECS).max(1),
            ),
            fetch_limit: env_parse("DIGEST_FETCH_LIMIT", DEFAULT_FETCH_LIMIT).max(1),
            delivery_delay: Duration::from_millis(env_parse(
                "DIGEST_DELIVERY_DELAY_MS",
                DEFAULT_DELIVERY_DELAY_MS,
            )),
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const KEYS: &[&str] = &[
        "TELEGRAM_BOT_TOKEN",
        "PERSONAL_CHAT_ID",
        "DIGEST_INTERVAL_SECS",
        "DIGEST_FETCH_LIMIT",
        "DIGEST_BIND_ADDR",
        "REDDIT_USER_AGENT",
    ];

    fn clear() {
        for k in KEYS {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_apply_when_env_is_empty() {
        clear();
        let cfg = AppConfig::from_env().unwrap();
        assert!(cfg.personal_chat_id.is_none());
        assert_eq!(cfg.interval, Duration::from_secs(7200));
        assert_eq!(cfg.fetch_limit, 10);
        assert_eq!(cfg.reddit.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.ledger_path, PathBuf::from(DEFAULT_LEDGER_PATH));
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_bad_numbers_fall_back() {
        clear();
        env::set_var("PERSONAL_CHAT_ID", " 12345 ");
        env::set_var("DIGEST_INTERVAL_SECS", "60");
        env::set_var("DIGEST_FETCH_LIMIT", "lots");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.personal_chat_id.as_deref(), Some("12345"));
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert_eq!(cfg.fetch_limit, DEFAULT_FETCH_LIMIT);

        env::set_var("DIGEST_BIND_ADDR", "not-an-addr");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
