//! Chats the bot has seen traffic from.
//!
//! The Bot API has no "list my dialogs" or "read history" call, so we remember
//! each chat's title and the highest message id observed in it. Probe progress
//! is kept here too, so ids that failed in an earlier run are not walked again.
//! In-memory only.

use std::collections::HashMap;

use tokio::sync::Mutex;

use tfw_core::{
    domain::{ChatId, MessageId},
    transport::ChatSummary,
};

#[derive(Clone, Debug)]
struct ObservedChat {
    title: String,
    high_water: MessageId,
    probe: Option<ProbeMark>,
}

/// A streak of probing that began after `from` and has attempted every id
/// through `through`.
#[derive(Clone, Copy, Debug)]
struct ProbeMark {
    from: i32,
    through: i32,
}

#[derive(Debug, Default)]
pub struct ChatDirectory {
    chats: Mutex<HashMap<ChatId, ObservedChat>>,
}

impl ChatDirectory {
    pub async fn observe(&self, chat_id: ChatId, title: Option<String>, message_id: MessageId) {
        let mut chats = self.chats.lock().await;
        let entry = chats.entry(chat_id).or_insert_with(|| ObservedChat {
            title: String::new(),
            high_water: message_id,
            probe: None,
        });
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            entry.title = title;
        }
        if message_id > entry.high_water {
            entry.high_water = message_id;
        }
    }

    pub async fn high_water(&self, chat_id: ChatId) -> Option<MessageId> {
        self.chats.lock().await.get(&chat_id).map(|c| c.high_water)
    }

    /// First id to probe for a run that starts after `after`.
    ///
    /// When `after` falls inside the current streak, ids already attempted are
    /// skipped. Any other `after` (a rewind or a jump) starts a new streak.
    pub async fn probe_start(&self, chat_id: ChatId, after: Option<MessageId>) -> MessageId {
        let after = after.map_or(0, |a| a.0.max(0));
        let mut chats = self.chats.lock().await;
        let Some(chat) = chats.get_mut(&chat_id) else {
            return MessageId(after.saturating_add(1));
        };
        match chat.probe {
            Some(mark) if mark.from <= after && after <= mark.through => {
                MessageId(mark.through.saturating_add(1))
            }
            _ => {
                chat.probe = Some(ProbeMark {
                    from: after,
                    through: after,
                });
                MessageId(after.saturating_add(1))
            }
        }
    }

    /// Record that every id up to `through` has been attempted.
    pub async fn mark_probed(&self, chat_id: ChatId, through: MessageId) {
        let mut chats = self.chats.lock().await;
        if let Some(mark) = chats.get_mut(&chat_id).and_then(|c| c.probe.as_mut()) {
            mark.through = mark.through.max(through.0);
        }
    }

    pub async fn list(&self) -> Vec<ChatSummary> {
        let chats = self.chats.lock().await;
        let mut out: Vec<ChatSummary> = chats
            .iter()
            .map(|(id, c)| ChatSummary {
                id: *id,
                title: c.title.clone(),
            })
            .collect();
        out.sort_by_key(|c| c.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_highest_id_and_latest_title() {
        let dir = ChatDirectory::default();
        dir.observe(ChatId(-100), Some("Old".to_string()), MessageId(10))
            .await;
        dir.observe(ChatId(-100), None, MessageId(7)).await;
        dir.observe(ChatId(-100), Some("New".to_string()), MessageId(12))
            .await;
        dir.observe(ChatId(5), Some("alice".to_string()), MessageId(1))
            .await;

        assert_eq!(dir.high_water(ChatId(-100)).await, Some(MessageId(12)));
        assert_eq!(dir.high_water(ChatId(-1)).await, None);
        assert_eq!(
            dir.list().await,
            vec![
                ChatSummary {
                    id: ChatId(-100),
                    title: "New".to_string()
                },
                ChatSummary {
                    id: ChatId(5),
                    title: "alice".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn probe_streak_resumes_past_attempted_ids() {
        let dir = ChatDirectory::default();
        let chat = ChatId(-100);
        assert_eq!(dir.probe_start(chat, None).await, MessageId(1));

        dir.observe(chat, None, MessageId(100)).await;
        assert_eq!(dir.probe_start(chat, None).await, MessageId(1));
        dir.mark_probed(chat, MessageId(3)).await;
        assert_eq!(dir.probe_start(chat, None).await, MessageId(4));

        // A cursor that moved inside the streak keeps the streak.
        assert_eq!(dir.probe_start(chat, Some(MessageId(2))).await, MessageId(4));

        // Jumping ahead or rewinding starts over from the new bound.
        assert_eq!(dir.probe_start(chat, Some(MessageId(50))).await, MessageId(51));
        assert_eq!(dir.probe_start(chat, Some(MessageId(10))).await, MessageId(11));
    }
}
