// src/config/store.rs
//! Runtime-mutable configuration: the ordered source list and the analysis
//! prompt. Every mutation is persisted; on a write failure the in-memory value
//! is kept and written again with the next mutation (last write wins).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StorageError;
use crate::ingest::config::{clean_list, load_sources_from, normalize_source_name, render_sources_toml};

pub const DEFAULT_SOURCES: &[&str] = &["Python", "MachineLearning", "Programming"];

pub const DEFAULT_PROMPT: &str = "\
Analyze the following batch of Reddit posts and their top comments. Extract and summarize:

1. **Key Insights**: New information or important discoveries
2. **Interesting Discussions**: Notable debates or conversations
3. **Useful Tips**: Practical advice or recommendations
4. **Notable Perspectives**: Unique opinions or viewpoints
5. **Trending Topics**: Popular or controversial subjects

Provide a concise, well-structured digest highlighting the most valuable content.
Focus on information that would be useful and interesting to someone following this topic.
Use short sections and bullet points for readability.

If a post is not particularly noteworthy, mention it in one line at most.";

#[derive(Debug, Clone)]
struct Inner {
    sources: Vec<String>,
    prompt: String,
}

#[derive(Debug)]
pub struct ConfigStore {
    sources_path: PathBuf,
    prompt_path: PathBuf,
    inner: RwLock<Inner>,
}

impl ConfigStore {
    /// Load both records, creating them with defaults on first run.
    pub fn load_or_init(
        sources_path: impl Into<PathBuf>,
        prompt_path: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let sources_path = sources_path.into();
        let prompt_path = prompt_path.into();

        let sources = if sources_path.exists() {
            load_sources_from(&sources_path).map_err(|e| StorageError::Corrupt {
                path: sources_path.clone(),
                reason: format!("{e:#}"),
            })?
        } else {
            let defaults: Vec<String> = DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect();
            write_sources(&sources_path, &defaults)?;
            tracing::info!(path = %sources_path.display(), "created default source list");
            defaults
        };

        let prompt = match fs::read_to_string(&prompt_path) {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => DEFAULT_PROMPT.to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_text(&prompt_path, DEFAULT_PROMPT)?;
                tracing::info!(path = %prompt_path.display(), "created default prompt");
                DEFAULT_PROMPT.to_string()
            }
            Err(e) => return Err(StorageError::io(&prompt_path, e)),
        };

        Ok(Self {
            sources_path,
            prompt_path,
            inner: RwLock::new(Inner { sources, prompt }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn sources(&self) -> Vec<String> {
        self.read().sources.clone()
    }

    pub fn prompt(&self) -> String {
        self.read().prompt.clone()
    }

    /// Append `name` unless present (case-insensitive). Returns true if added.
    pub fn add_source(&self, name: &str) -> Result<bool, StorageError> {
        let name = normalize_source_name(name);
        if name.is_empty() {
            return Err(StorageError::Invalid("empty source name".into()));
        }
        let mut g = self.write();
        if g.sources.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
            return Ok(false);
        }
        g.sources.push(name);
        write_sources(&self.sources_path, &g.sources)?;
        Ok(true)
    }

    /// Remove `name` (case-insensitive). Returns true if it was present.
    pub fn remove_source(&self, name: &str) -> Result<bool, StorageError> {
        let name = normalize_source_name(name);
        let mut g = self.write();
        let before = g.sources.len();
        g.sources.retain(|s| !s.eq_ignore_ascii_case(&name));
        if g.sources.len() == before {
            return Ok(false);
        }
        write_sources(&self.sources_path, &g.sources)?;
        Ok(true)
    }

    /// Replace the whole list. An empty (after cleaning) list is rejected.
    pub fn replace_sources<I, S>(&self, names: I) -> Result<Vec<String>, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cleaned = clean_list(names);
        if cleaned.is_empty() {
            return Err(StorageError::Invalid("at least one source is required".into()));
        }
        let mut g = self.write();
        g.sources = cleaned.clone();
        write_sources(&self.sources_path, &g.sources)?;
        Ok(cleaned)
    }

    pub fn set_prompt(&self, prompt: &str) -> Result<(), StorageError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StorageError::Invalid("empty prompt".into()));
        }
        let mut g = self.write();
        g.prompt = prompt.to_string();
        write_text(&self.prompt_path, &g.prompt)
    }
}

fn write_sources(path: &Path, sources: &[String]) -> Result<(), StorageError> {
    let body = render_sources_toml(sources).map_err(|e| StorageError::Invalid(format!("{e:#}")))?;
    write_text(path, &body)
}

fn write_text(path: &Path, body: &str) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, body).map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}
