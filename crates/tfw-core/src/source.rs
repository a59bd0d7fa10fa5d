//! Ordered view over a transport's message source.

use tracing::debug;

use crate::{
    domain::{ChatId, MessageId},
    transport::{ForwardTransport, MessageSource, SourceMessage},
    Result,
};

/// Yields source messages with strictly increasing ids above the lower bound.
///
/// Transports are expected to return ascending ids already; anything at or
/// below the last yielded id is dropped so the cursor can never move backwards.
pub struct OrderedSource {
    inner: Box<dyn MessageSource>,
    floor: Option<MessageId>,
}

impl OrderedSource {
    pub async fn open(
        transport: &dyn ForwardTransport,
        chat: ChatId,
        after: Option<MessageId>,
    ) -> Result<Self> {
        let inner = transport.open_source(chat, after).await?;
        Ok(Self::new(inner, after))
    }

    pub fn new(inner: Box<dyn MessageSource>, after: Option<MessageId>) -> Self {
        Self {
            inner,
            floor: after,
        }
    }

    pub async fn next(&mut self) -> Result<Option<SourceMessage>> {
        loop {
            let Some(msg) = self.inner.next_message().await? else {
                return Ok(None);
            };
            if self.floor.is_some_and(|floor| msg.id <= floor) {
                debug!(id = msg.id.0, "dropping out-of-order source message");
                continue;
            }
            self.floor = Some(msg.id);
            return Ok(Some(msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<Option<SourceMessage>>>);

    #[async_trait]
    impl MessageSource for Scripted {
        async fn next_message(&mut self) -> Result<Option<SourceMessage>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn msg(id: i32) -> Result<Option<SourceMessage>> {
        Ok(Some(SourceMessage {
            chat_id: ChatId(-100),
            id: MessageId(id),
        }))
    }

    #[tokio::test]
    async fn skips_ids_at_or_below_the_bound_and_duplicates() {
        let script = Scripted(VecDeque::from(vec![msg(3), msg(5), msg(6), msg(6), msg(4), msg(9)]));
        let mut src = OrderedSource::new(Box::new(script), Some(MessageId(4)));

        let mut ids = Vec::new();
        while let Some(m) = src.next().await.unwrap() {
            ids.push(m.id.0);
        }
        assert_eq!(ids, vec![5, 6, 9]);
    }

    #[tokio::test]
    async fn fault_is_surfaced_to_the_caller() {
        let script = Scripted(VecDeque::from(vec![
            msg(1),
            Err(Error::External("history unavailable".to_string())),
            msg(2),
        ]));
        let mut src = OrderedSource::new(Box::new(script), None);

        assert_eq!(src.next().await.unwrap().map(|m| m.id), Some(MessageId(1)));
        assert!(src.next().await.is_err());
    }
}
