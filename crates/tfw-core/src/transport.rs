//! Hexagonal port for the remote messaging service.
//!
//! The Telegram adapter implements this over the Bot API; tests use in-memory fakes.

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;

use crate::{
    domain::{ChatId, MessageId},
    Result,
};

/// A message drawn from the source collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceMessage {
    pub chat_id: ChatId,
    pub id: MessageId,
}

/// A chat the transport can see (`listchats`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub title: String,
}

/// Why a single delivery failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The service demands a wait before the next attempt.
    #[error("rate limited, retry after {}s", wait.as_secs())]
    RateLimited { wait: Duration },

    /// Anything else. The message is skipped.
    #[error("delivery failed: {0}")]
    Transient(String),
}

impl DeliveryError {
    /// Classify a free-text service error.
    ///
    /// Some client libraries only surface flood waits as text ("A wait of 17
    /// seconds is required", "Too Many Requests: retry after 17"). Anything we
    /// cannot parse stays transient.
    pub fn from_error_text(text: &str) -> Self {
        static WAIT_RE: OnceLock<Regex> = OnceLock::new();
        let re = WAIT_RE.get_or_init(|| {
            Regex::new(r"(?i)(?:a wait of|retry after)\s+(\d+)").expect("valid regex")
        });

        let secs = re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());

        match secs {
            Some(secs) => DeliveryError::RateLimited {
                wait: Duration::from_secs(secs),
            },
            None => DeliveryError::Transient(text.to_string()),
        }
    }
}

/// Lazy, finite sequence of source messages in ascending id order.
///
/// A fault (`Err`) ends the sequence; callers start a new one from the last
/// confirmed id.
#[async_trait]
pub trait MessageSource: Send {
    async fn next_message(&mut self) -> Result<Option<SourceMessage>>;
}

#[async_trait]
pub trait ForwardTransport: Send + Sync {
    /// Messages of `chat` with id strictly greater than `after` (all of them when `None`).
    async fn open_source(
        &self,
        chat: ChatId,
        after: Option<MessageId>,
    ) -> Result<Box<dyn MessageSource>>;

    /// Copy one message into `destination`. `Ok` means the service accepted it.
    async fn send(
        &self,
        destination: ChatId,
        message: &SourceMessage,
    ) -> std::result::Result<(), DeliveryError>;

    async fn list_chats(&self) -> Result<Vec<ChatSummary>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flood_wait_texts() {
        assert_eq!(
            DeliveryError::from_error_text("A wait of 17 seconds is required (caused by SendMessage)"),
            DeliveryError::RateLimited {
                wait: Duration::from_secs(17)
            }
        );
        assert_eq!(
            DeliveryError::from_error_text("Too Many Requests: retry after 5"),
            DeliveryError::RateLimited {
                wait: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn unparsable_text_is_transient() {
        assert_eq!(
            DeliveryError::from_error_text("Bad Request: message to copy not found"),
            DeliveryError::Transient("Bad Request: message to copy not found".to_string())
        );
        assert!(matches!(
            DeliveryError::from_error_text("A wait of many seconds"),
            DeliveryError::Transient(_)
        ));
    }
}
