// src/notify/mod.rs
pub mod format;
pub mod log;
pub mod telegram;

use metrics::counter;

use crate::error::DeliveryError;

pub use format::{split_for_channel, split_message, CONTINUED_MARKER};
pub use log::LogChannel;
pub use telegram::TelegramChannel;

/// Telegram's hard message limit, in characters.
pub const TELEGRAM_MAX_LEN: usize = 4096;

#[async_trait::async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver one segment. Callers guarantee `text` fits `max_len()`.
    async fn send(&self, target: &str, text: &str) -> Result<(), DeliveryError>;

    fn max_len(&self) -> usize;

    fn channel_name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Split `text` for `channel` and send every segment in order.
/// A rejected segment is logged and the remaining ones are still sent.
pub async fn deliver_text(
    channel: &dyn DeliveryChannel,
    target: &str,
    text: &str,
) -> DeliveryOutcome {
    let mut outcome = DeliveryOutcome::default();
    for (i, seg) in split_for_channel(text, channel.max_len()).iter().enumerate() {
        match channel.send(target, seg).await {
            Ok(()) => {
                outcome.sent += 1;
                counter!("digest_segments_sent_total").increment(1);
            }
            Err(e) => {
                outcome.failed += 1;
                counter!("digest_delivery_errors_total").increment(1);
                tracing::warn!(
                    channel = channel.channel_name(),
                    chat = target,
                    segment = i,
                    error = %e,
                    "segment delivery failed"
                );
            }
        }
    }
    outcome
}
