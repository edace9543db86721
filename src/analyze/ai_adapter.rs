//! Summarization backends behind one capability trait.
//! The backend is chosen once at construction (`build_service_from_config`),
//! never per call.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ai::{Backend, SummarizerConfig};
use crate::error::SummarizationError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[async_trait]
pub trait SummarizationService: Send + Sync {
    /// Run one completion: `system_prompt` is the fixed instruction,
    /// `user_content` the material to summarize.
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, SummarizationError>;

    /// Backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynSummarizer = Arc<dyn SummarizationService>;

/// Factory: build a service according to config.
///
/// * `mock` → deterministic [`MockService`].
/// * `disabled` → [`DisabledService`].
/// * `openai` / `zai` → the HTTP backend; a missing API key is a startup error.
pub fn build_service_from_config(cfg: &SummarizerConfig) -> Result<DynSummarizer, SummarizationError> {
    match cfg.backend {
        Backend::Mock => Ok(Arc::new(MockService::fixed(
            "Mock digest: nothing was sent to a model.",
        ))),
        Backend::Disabled => Ok(Arc::new(DisabledService)),
        Backend::OpenAi => Ok(Arc::new(OpenAiService::new(cfg)?)),
        Backend::Zai => Ok(Arc::new(ZaiService::new(cfg)?)),
    }
}

// ------------------------------------------------------------
// Shared chat-completions client
// ------------------------------------------------------------

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-style `/chat/completions` caller shared by the HTTP backends.
struct ChatCompletions {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletions {
    fn new(cfg: &SummarizerConfig, backend: &'static str) -> Result<Self, SummarizationError> {
        if cfg.api_key.trim().is_empty() {
            return Err(SummarizationError::MissingApiKey(backend));
        }
        let http = reqwest::Client::builder()
            .user_agent("reddit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.effective_base_url()),
            api_key: cfg.api_key.clone(),
            model: cfg.effective_model(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    async fn send(&self, body: &Value) -> Result<String, SummarizationError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SummarizationError::Status {
                status: status.as_u16(),
                body: text.chars().take(300).collect(),
            });
        }
        let text = resp.text().await?;
        parse_completion(&text)
    }
}

/// Extract the first choice's content. Missing/null content is an empty string.
pub fn parse_completion(body: &str) -> Result<String, SummarizationError> {
    let resp: Resp =
        serde_json::from_str(body).map_err(|e| SummarizationError::Malformed(e.to_string()))?;
    let first = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SummarizationError::Malformed("no choices".into()))?;
    Ok(first.message.content.unwrap_or_default())
}

// ------------------------------------------------------------
// Concrete backends
// ------------------------------------------------------------

/// OpenAI (or any OpenAI-compatible base URL). Requires `OPENAI_API_KEY`.
pub struct OpenAiService {
    inner: ChatCompletions,
}

impl OpenAiService {
    pub fn new(cfg: &SummarizerConfig) -> Result<Self, SummarizationError> {
        Ok(Self {
            inner: ChatCompletions::new(cfg, "openai")?,
        })
    }
}

#[async_trait]
impl SummarizationService for OpenAiService {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, SummarizationError> {
        let body = self.inner.request_body(system_prompt, user_content);
        self.inner.send(&body).await
    }

    fn backend_name(&self) -> &'static str {
        "openai"
    }
}

/// Z.ai GLM endpoint. Same wire shape, with model "thinking" switched off.
pub struct ZaiService {
    inner: ChatCompletions,
}

impl ZaiService {
    pub fn new(cfg: &SummarizerConfig) -> Result<Self, SummarizationError> {
        Ok(Self {
            inner: ChatCompletions::new(cfg, "zai")?,
        })
    }
}

#[async_trait]
impl SummarizationService for ZaiService {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, SummarizationError> {
        let mut body = self.inner.request_body(system_prompt, user_content);
        body["thinking"] = json!({ "type": "disabled" });
        self.inner.send(&body).await
    }

    fn backend_name(&self) -> &'static str {
        "zai"
    }
}

/// Always fails with [`SummarizationError::Disabled`].
pub struct DisabledService;

#[async_trait]
impl SummarizationService for DisabledService {
    async fn complete(&self, _: &str, _: &str) -> Result<String, SummarizationError> {
        Err(SummarizationError::Disabled)
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic service for tests/local runs. Records every call.
#[derive(Default)]
pub struct MockService {
    reply: String,
    fail_when: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockService {
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    /// Fail any call whose content contains `needle`.
    pub fn failing_when(mut self, needle: impl Into<String>) -> Self {
        self.fail_when = Some(needle.into());
        self
    }

    /// (system_prompt, user_content) pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl SummarizationService for MockService {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, SummarizationError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((system_prompt.to_string(), user_content.to_string()));
        if let Some(needle) = &self.fail_when {
            if user_content.contains(needle.as_str()) {
                return Err(SummarizationError::Other(format!(
                    "mock failure on {needle}"
                )));
            }
        }
        Ok(self.reply.clone())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
