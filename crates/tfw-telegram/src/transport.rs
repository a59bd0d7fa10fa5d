//! `ForwardTransport` over the Telegram Bot API.
//!
//! - delivery is `copyMessage` (no "Forwarded from" header)
//! - the source walks candidate ids up to the chat's observed high-water mark;
//!   ids that no longer exist fail delivery and are skipped by the controller,
//!   and later runs continue past them instead of walking them again
//! - 429 `RetryAfter` surfaces as a structured rate limit, never retried here

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{prelude::*, RequestError};
use tracing::{debug, warn};

use tfw_core::{
    config::Config,
    domain::{ChatId, MessageId},
    transport::{ChatSummary, DeliveryError, ForwardTransport, MessageSource, SourceMessage},
    Result,
};

use crate::directory::ChatDirectory;

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    directory: Arc<ChatDirectory>,
    probe_limit: u32,
}

impl TelegramTransport {
    pub fn new(bot: Bot, directory: Arc<ChatDirectory>, probe_limit: u32) -> Self {
        Self {
            bot,
            directory,
            probe_limit,
        }
    }

    /// Authorize with the bot token from config.
    pub fn connect(cfg: &Config) -> Self {
        Self::new(
            Bot::new(cfg.telegram_bot_token.clone()),
            Arc::new(ChatDirectory::default()),
            cfg.source_probe_limit,
        )
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn directory(&self) -> Arc<ChatDirectory> {
        self.directory.clone()
    }
}

pub(crate) fn map_delivery_err(e: RequestError) -> DeliveryError {
    match e {
        RequestError::RetryAfter(wait) => DeliveryError::RateLimited { wait },
        other => DeliveryError::from_error_text(&other.to_string()),
    }
}

#[async_trait]
impl ForwardTransport for TelegramTransport {
    async fn open_source(
        &self,
        chat: ChatId,
        after: Option<MessageId>,
    ) -> Result<Box<dyn MessageSource>> {
        let Some(high_water) = self.directory.high_water(chat).await else {
            warn!(
                chat = chat.0,
                "no messages observed in source chat yet; nothing to forward"
            );
            return Ok(Box::new(ProbeSource::empty(chat, self.directory.clone())));
        };

        let first = self.directory.probe_start(chat, after).await;
        let source = ProbeSource::new(
            chat,
            first,
            high_water,
            self.probe_limit,
            self.directory.clone(),
        );
        debug!(
            chat = chat.0,
            first = source.next,
            last = source.last,
            "probing source ids"
        );
        Ok(Box::new(source))
    }

    async fn send(
        &self,
        destination: ChatId,
        message: &SourceMessage,
    ) -> std::result::Result<(), DeliveryError> {
        self.bot
            .copy_message(
                teloxide::types::ChatId(destination.0),
                teloxide::types::ChatId(message.chat_id.0),
                teloxide::types::MessageId(message.id.0),
            )
            .await
            .map(|_| ())
            .map_err(map_delivery_err)
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        Ok(self.directory.list().await)
    }
}

/// Ascending candidate ids in `[first, high_water]`, capped at `limit` ids.
///
/// Asking for the next id means the previous one has been attempted, so that
/// id is recorded as probed in the directory.
struct ProbeSource {
    chat: ChatId,
    first: i32,
    next: i32,
    last: i32,
    directory: Arc<ChatDirectory>,
}

impl ProbeSource {
    fn new(
        chat: ChatId,
        first: MessageId,
        high_water: MessageId,
        limit: u32,
        directory: Arc<ChatDirectory>,
    ) -> Self {
        let first = first.0.max(1);
        let span = i32::try_from(limit).unwrap_or(i32::MAX).saturating_sub(1);
        let last = high_water.0.min(first.saturating_add(span));
        Self {
            chat,
            first,
            next: first,
            last,
            directory,
        }
    }

    fn empty(chat: ChatId, directory: Arc<ChatDirectory>) -> Self {
        Self {
            chat,
            first: 1,
            next: 1,
            last: 0,
            directory,
        }
    }
}

#[async_trait]
impl MessageSource for ProbeSource {
    async fn next_message(&mut self) -> Result<Option<SourceMessage>> {
        if self.next > self.first {
            self.directory
                .mark_probed(self.chat, MessageId(self.next - 1))
                .await;
        }
        if self.next > self.last {
            return Ok(None);
        }
        let id = MessageId(self.next);
        self.next += 1;
        Ok(Some(SourceMessage {
            chat_id: self.chat,
            id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain(src: &mut dyn MessageSource) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(m) = src.next_message().await.unwrap() {
            out.push(m.id.0);
        }
        out
    }

    fn transport(limit: u32) -> TelegramTransport {
        TelegramTransport::new(
            Bot::new("123:abc"),
            Arc::new(ChatDirectory::default()),
            limit,
        )
    }

    #[tokio::test]
    async fn probes_after_bound_up_to_high_water() {
        let dir = Arc::new(ChatDirectory::default());
        let mut src = ProbeSource::new(ChatId(-1), MessageId(4), MessageId(6), 100, dir.clone());
        assert_eq!(drain(&mut src).await, vec![4, 5, 6]);

        let mut src = ProbeSource::new(ChatId(-1), MessageId(1), MessageId(3), 100, dir);
        assert_eq!(drain(&mut src).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn caps_the_walk_and_handles_exhausted_ranges() {
        let dir = Arc::new(ChatDirectory::default());
        let mut src = ProbeSource::new(ChatId(-1), MessageId(11), MessageId(1000), 3, dir.clone());
        assert_eq!(drain(&mut src).await, vec![11, 12, 13]);

        let mut src = ProbeSource::new(ChatId(-1), MessageId(10), MessageId(9), 100, dir.clone());
        assert!(drain(&mut src).await.is_empty());

        assert!(drain(&mut ProbeSource::empty(ChatId(-1), dir)).await.is_empty());
    }

    #[test]
    fn retry_after_is_a_structured_rate_limit() {
        assert_eq!(
            map_delivery_err(RequestError::RetryAfter(Duration::from_secs(9))),
            DeliveryError::RateLimited {
                wait: Duration::from_secs(9)
            }
        );
    }

    #[tokio::test]
    async fn open_source_without_observations_is_empty() {
        let transport = transport(100);
        let mut src = transport.open_source(ChatId(-5), None).await.unwrap();
        assert!(src.next_message().await.unwrap().is_none());

        transport
            .directory()
            .observe(ChatId(-5), Some("src".to_string()), MessageId(2))
            .await;
        let mut src = transport.open_source(ChatId(-5), None).await.unwrap();
        assert_eq!(src.next_message().await.unwrap().map(|m| m.id), Some(MessageId(1)));
    }

    #[tokio::test]
    async fn failed_windows_are_not_walked_again() {
        let chat = ChatId(-5);
        let transport = transport(3);
        transport.directory().observe(chat, None, MessageId(100)).await;

        // Nothing gets delivered, so the cursor stays unset between runs.
        let mut src = transport.open_source(chat, None).await.unwrap();
        assert_eq!(drain(src.as_mut()).await, vec![1, 2, 3]);
        let mut src = transport.open_source(chat, None).await.unwrap();
        assert_eq!(drain(src.as_mut()).await, vec![4, 5, 6]);

        // A run that stops before its current id is attempted retries that id.
        let mut src = transport.open_source(chat, None).await.unwrap();
        assert_eq!(src.next_message().await.unwrap().map(|m| m.id), Some(MessageId(7)));
        assert_eq!(src.next_message().await.unwrap().map(|m| m.id), Some(MessageId(8)));
        let mut src = transport.open_source(chat, Some(MessageId(7))).await.unwrap();
        assert_eq!(drain(src.as_mut()).await, vec![8, 9, 10]);
    }
}
