use crate::domain::{ChatId, UserId};

/// Cross-messenger inbound text message.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub author_id: UserId,
    /// Display name used in replies.
    pub author_name: String,
    pub text: String,
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
