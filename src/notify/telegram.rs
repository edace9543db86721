use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::format::render_html;
use super::{DeliveryChannel, TELEGRAM_MAX_LEN};
use crate::error::DeliveryError;

const API_BASE: &str = "https://api.telegram.org";
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Telegram Bot API `sendMessage` channel (HTML parse mode).
#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramChannel {
    pub fn new(token: String) -> Result<Self, DeliveryError> {
        if token.trim().is_empty() {
            return Err(DeliveryError::Config(
                "Telegram bot token must not be empty".into(),
            ));
        }
        Ok(Self {
            token,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn post_once(&self, payload: &SendMessage<'_>) -> Result<(), DeliveryError> {
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;
        let status = rsp.status();
        if status.is_server_error() {
            let text = rsp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                code: status.as_u16(),
                description: text.chars().take(200).collect(),
            });
        }
        let body: ApiResponse = rsp.json().await?;
        if body.ok {
            return Ok(());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.error_code == Some(429) {
            let retry_after = body
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(5);
            return Err(DeliveryError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        Err(DeliveryError::Rejected {
            code: body.error_code.unwrap_or(status.as_u16()),
            description: body.description.unwrap_or_default(),
        })
    }

    /// Retry rate limits (honouring `retry_after`), transport errors and 5xx
    /// replies with exponential backoff; 4xx rejections return immediately.
    async fn post_with_retries(&self, payload: &SendMessage<'_>) -> Result<(), DeliveryError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.post_once(payload).await {
                Ok(()) => return Ok(()),
                Err(DeliveryError::RateLimited { retry_after_secs })
                    if attempt < self.max_retries =>
                {
                    let wait = retry_after_secs.min(MAX_RETRY_AFTER_SECS);
                    tracing::warn!(wait, attempt, "telegram rate limited");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Err(DeliveryError::Http(e)) if attempt < self.max_retries => {
                    tracing::debug!(error = %e, attempt, "telegram request failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(DeliveryError::Rejected { code, description })
                    if code >= 500 && attempt < self.max_retries =>
                {
                    tracing::debug!(code, %description, attempt, "telegram server error, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[async_trait::async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, target: &str, text: &str) -> Result<(), DeliveryError> {
        let len = text.chars().count();
        if len > TELEGRAM_MAX_LEN {
            return Err(DeliveryError::TooLong {
                len,
                max: TELEGRAM_MAX_LEN,
            });
        }

        let html = render_html(text);
        let payload = if html.chars().count() <= TELEGRAM_MAX_LEN {
            SendMessage::html(target, &html)
        } else {
            SendMessage::plain(target, text)
        };

        match self.post_with_retries(&payload).await {
            // Markup rejected by the parser: fall back to the raw text.
            Err(DeliveryError::Rejected { code: 400, description })
                if payload.parse_mode.is_some() && description.contains("parse entities") =>
            {
                tracing::warn!(%description, "telegram refused markup, resending as plain text");
                self.post_with_retries(&SendMessage::plain(target, text)).await
            }
            other => other,
        }
    }

    fn max_len(&self) -> usize {
        TELEGRAM_MAX_LEN
    }

    fn channel_name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

impl<'a> SendMessage<'a> {
    fn html(chat_id: &'a str, text: &'a str) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: Some("HTML"),
            disable_web_page_preview: true,
        }
    }

    fn plain(chat_id: &'a str, text: &'a str) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: None,
            disable_web_page_preview: true,
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            TelegramChannel::new("  ".into()),
            Err(DeliveryError::Config(_))
        ));
    }

    #[test]
    fn payload_shape() {
        let v = serde_json::to_value(SendMessage::html("42", "<b>x</b>")).unwrap();
        assert_eq!(v["chat_id"], "42");
        assert_eq!(v["parse_mode"], "HTML");
        let plain = serde_json::to_value(SendMessage::plain("42", "x")).unwrap();
        assert!(plain.get("parse_mode").is_none());
    }

    #[test]
    fn error_response_parses() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":7}}"#;
        let r: ApiResponse = serde_json::from_str(body).unwrap();
        assert!(!r.ok);
        assert_eq!(r.parameters.and_then(|p| p.retry_after), Some(7));
    }

    #[tokio::test]
    async fn oversized_segment_is_refused_locally() {
        let ch = TelegramChannel::new("t".into()).unwrap();
        let text = "x".repeat(TELEGRAM_MAX_LEN + 1);
        assert!(matches!(
            ch.send("1", &text).await,
            Err(DeliveryError::TooLong { .. })
        ));
    }
}
