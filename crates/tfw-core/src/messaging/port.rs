use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Messenger port used for progress notices and command replies.
///
/// Telegram is the only implementation; tests record sends in memory.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}
