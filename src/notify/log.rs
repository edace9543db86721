// src/notify/log.rs
use std::sync::Mutex;

use crate::error::DeliveryError;

use super::DeliveryChannel;

/// Channel that only logs and records what it was asked to send.
/// Used when no bot token is configured, by the demo bin and by tests.
pub struct LogChannel {
    max_len: usize,
    reject_containing: Option<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl LogChannel {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            reject_containing: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Reject (with [`DeliveryError::Rejected`]) segments containing `needle`.
    pub fn rejecting(mut self, needle: impl Into<String>) -> Self {
        self.reject_containing = Some(needle.into());
        self
    }

    /// (target, text) pairs delivered so far, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, t)| t).collect()
    }
}

#[async_trait::async_trait]
impl DeliveryChannel for LogChannel {
    async fn send(&self, target: &str, text: &str) -> Result<(), DeliveryError> {
        let len = text.chars().count();
        if len > self.max_len {
            return Err(DeliveryError::TooLong {
                len,
                max: self.max_len,
            });
        }
        if let Some(needle) = &self.reject_containing {
            if text.contains(needle.as_str()) {
                return Err(DeliveryError::Rejected {
                    code: 400,
                    description: format!("rejected segment containing {needle}"),
                });
            }
        }
        tracing::info!(target: "notify", chat = target, chars = len, "{text}");
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((target.to_string(), text.to_string()));
        Ok(())
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn channel_name(&self) -> &'static str {
        "log"
    }
}
