//! Telegram update handlers.
//!
//! Every message and channel post feeds the chat directory (titles and
//! high-water ids). Slash commands from allowed users drive the controller.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use tfw_core::domain::{ChatId, MessageId, UserId};
use tfw_core::security::is_authorized;

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    observe(&state, &msg).await;

    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }

    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));
    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    commands::handle_command(msg.chat.id.0, text, state).await
}

/// Channels deliver posts as `channel_post`; we only learn ids and titles from them.
pub async fn handle_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    observe(&state, &msg).await;
    Ok(())
}

async fn observe(state: &AppState, msg: &Message) {
    let title = msg
        .chat
        .title()
        .or_else(|| msg.chat.username())
        .or_else(|| msg.chat.first_name())
        .map(str::to_string);
    state
        .directory
        .observe(ChatId(msg.chat.id.0), title, MessageId(msg.id.0))
        .await;
}
