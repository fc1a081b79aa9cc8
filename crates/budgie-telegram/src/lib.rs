//! Telegram adapter (teloxide).
//!
//! This crate implements the `budgie-core` MessagingPort over the Telegram Bot
//! API and feeds inbound messages into the core dispatcher.

use async_trait::async_trait;

use teloxide::prelude::*;

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use budgie_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// Telegram rejects longer message texts.
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Retries once, and only when Telegram explicitly asks us to wait.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!("telegram flood limit, retrying in {d:?}");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<Option<MessageRef>> {
        // The Bot API rejects empty text (e.g. the list of an empty ledger).
        if text.trim().is_empty() {
            return Ok(None);
        }

        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;

        Ok(Some(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }))
    }
}
