use std::sync::Arc;

use teloxide::prelude::*;

use budgie_core::{
    domain::{ChatId, UserId},
    messaging::types::IncomingMessage,
};

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let incoming = IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        author_id: UserId(user.id.0 as i64),
        author_name: display_name(user.username.as_deref(), &user.first_name),
        text: text.to_string(),
    };

    // Failures are logged inside the dispatcher and never reach teloxide.
    state.dispatcher.handle(&incoming).await;
    Ok(())
}

/// Prefer the @username, falling back to the first name for users without one.
fn display_name(username: Option<&str>, first_name: &str) -> String {
    match username {
        Some(u) if !u.trim().is_empty() => u.to_string(),
        _ => first_name.to_string(),
    }
}
