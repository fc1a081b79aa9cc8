use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::MessagingCapabilities,
    Result,
};

/// Outbound chat port.
///
/// Telegram is the first implementation; the dispatcher only depends on this
/// trait so tests can swap in a recording fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send plain text to a channel. Implementations may skip empty text.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<Option<MessageRef>>;
}
