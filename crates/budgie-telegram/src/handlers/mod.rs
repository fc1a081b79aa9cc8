//! Telegram update handlers.
//!
//! Only text messages carry commands; every other update kind is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.text().is_some() {
        return text::handle_text(msg, state).await;
    }
    Ok(())
}
