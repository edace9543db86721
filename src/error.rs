// src/error.rs
//! Error taxonomy shared by the ingest, analyze and notify layers.
//! Every variant is recoverable at the orchestrator boundary.

use std::path::PathBuf;

/// Source temporarily unavailable: the source is skipped, the run continues.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error while fetching {source_name}: {err}")]
    Http {
        source_name: String,
        #[source]
        err: reqwest::Error,
    },

    #[error("{source_name} answered with status {status}")]
    Status { source_name: String, status: u16 },

    #[error("malformed listing for {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("source {0} is unavailable")]
    Unavailable(String),
}

/// Service unavailable or malformed response: recorded as a failure for the source.
#[derive(Debug, thiserror::Error)]
pub enum SummarizationError {
    #[error("summarizer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summarizer answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed summarizer response: {0}")]
    Malformed(String),

    #[error("missing API key for backend {0}")]
    MissingApiKey(&'static str),

    #[error("summarization is disabled")]
    Disabled,

    #[error("summarizer failure: {0}")]
    Other(String),
}

/// Ledger/config persistence failed: in-memory state is kept and written again
/// on the next mutation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("corrupt store {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid value: {0}")]
    Invalid(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            err,
        }
    }
}

/// Channel rejected a segment: logged, remaining segments/sources continue.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected message ({code}): {description}")]
    Rejected { code: u16, description: String },

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("segment of {len} chars exceeds channel limit {max}")]
    TooLong { len: usize, max: usize },

    #[error("channel misconfigured: {0}")]
    Config(String),
}
