// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const ZAI_DEFAULT_BASE_URL: &str = "https://api.z.ai/api/paas/v4";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const ZAI_DEFAULT_MODEL: &str = "glm-4.5-flash";

fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    OpenAi,
    Zai,
    Mock,
    Disabled,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "zai" | "z.ai" => Some(Self::Zai),
            "mock" => Some(Self::Mock),
            "disabled" | "off" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }

    fn key_env(self) -> &'static str {
        match self {
            Self::Zai => "ZAI_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub backend: Backend,
    /// "ENV" means: read from OPENAI_API_KEY / ZAI_API_KEY (by backend)
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl SummarizerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: SummarizerConfig = serde_json::from_str(&data)?;

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            let key = cfg.backend.key_env();
            cfg.api_key = match cfg.backend {
                Backend::OpenAi | Backend::Zai => {
                    env::var(key).map_err(|_| anyhow::anyhow!("Missing {key} env var"))?
                }
                Backend::Mock | Backend::Disabled => String::new(),
            };
        }
        cfg.sanitize();
        Ok(cfg)
    }

    /// `SUMMARIZER_BACKEND` wins over the legacy `USE_ZAI` switch.
    pub fn from_env() -> Self {
        let backend = env::var("SUMMARIZER_BACKEND")
            .ok()
            .and_then(|v| Backend::parse(&v))
            .unwrap_or_else(|| {
                let zai = env::var("USE_ZAI")
                    .map(|v| v.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                if zai {
                    Backend::Zai
                } else {
                    Backend::OpenAi
                }
            });
        let non_empty = |k: &str| env::var(k).ok().filter(|v| !v.trim().is_empty());
        let mut cfg = Self {
            backend,
            api_key: env::var(backend.key_env()).unwrap_or_default(),
            base_url: match backend {
                Backend::OpenAi => non_empty("OPENAI_BASE_URL"),
                _ => None,
            },
            model: non_empty("MODEL_NAME"),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        };
        cfg.sanitize();
        cfg
    }

    /// `config/ai.json` if present, environment otherwise.
    pub fn load_default() -> anyhow::Result<Self> {
        let p = Path::new("config/ai.json");
        if p.exists() {
            Self::load_from_file(p)
        } else {
            Ok(Self::from_env())
        }
    }

    pub fn effective_base_url(&self) -> String {
        let raw = self.base_url.clone().unwrap_or_else(|| {
            match self.backend {
                Backend::Zai => ZAI_DEFAULT_BASE_URL,
                _ => OPENAI_DEFAULT_BASE_URL,
            }
            .to_string()
        });
        raw.trim_end_matches('/').to_string()
    }

    pub fn effective_model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.backend {
                Backend::Zai => ZAI_DEFAULT_MODEL,
                _ => DEFAULT_MODEL,
            }
            .to_string()
        })
    }

    fn sanitize(&mut self) {
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
    }
}
