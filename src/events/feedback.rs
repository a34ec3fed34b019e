//! Cascading invalidation channel.
//!
//! A repository that removes a parent writes one synthetic event per
//! dependent onto a bounded queue. The queue is drained back into the
//! router, so repositories never call each other.
//!
//! Each event carries the moment its parent was removed. Dependents written
//! after that moment were re-created under a new parent and are kept.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::EventKind;
use crate::error::{CacheError, Result};
use crate::models::Snowflake;

/// An event authored by the cache itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEvent {
    pub kind: EventKind,
    pub payload: Vec<u8>,
    pub shard_id: u32,
    pub removed_at: Instant,
}

impl SyntheticEvent {
    /// `CHANNEL_DELETE` for a channel owned by a removed guild.
    pub fn channel_delete(
        channel_id: Snowflake,
        guild_id: Snowflake,
        shard_id: u32,
        removed_at: Instant,
    ) -> Self {
        Self {
            kind: EventKind::ChannelDelete,
            payload: format!(r#"{{"id":"{channel_id}","guild_id":"{guild_id}"}}"#).into_bytes(),
            shard_id,
            removed_at,
        }
    }

    /// `PRESENCE_REMOVE` for a presence recorded under a removed guild.
    pub fn presence_remove(
        user_id: Snowflake,
        guild_id: Snowflake,
        shard_id: u32,
        removed_at: Instant,
    ) -> Self {
        Self {
            kind: EventKind::PresenceRemove,
            payload: format!(r#"{{"user":{{"id":"{user_id}"}},"guild_id":"{guild_id}"}}"#)
                .into_bytes(),
            shard_id,
            removed_at,
        }
    }
}

/// Sending half of the invalidation queue, shared by all repositories.
#[derive(Debug, Clone)]
pub struct Feedback {
    tx: mpsc::Sender<SyntheticEvent>,
}

impl Feedback {
    /// Create a queue bounded to `capacity` pending events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyntheticEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue one event, waiting for room.
    pub async fn send(&self, event: SyntheticEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CacheError::FeedbackClosed)
    }

    /// Queue `events` from a separate task so the caller never waits on
    /// dependents. A full queue only holds up that task.
    pub fn emit(&self, events: Vec<SyntheticEvent>) {
        if events.is_empty() {
            return;
        }

        debug!("Queueing {} synthetic events", events.len());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let feedback = self.clone();
                handle.spawn(async move {
                    for event in events {
                        if let Err(e) = feedback.send(event).await {
                            warn!("{}, dropping cascade", e);
                            break;
                        }
                    }
                });
            }
            Err(_) => {
                for event in events {
                    if let Err(e) = self.tx.try_send(event) {
                        warn!("Dropping synthetic event outside a runtime: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::Ident;

    #[test]
    fn test_synthetic_payloads_parse() {
        let event = SyntheticEvent::channel_delete(Snowflake(5), Snowflake(1), 0, Instant::now());
        let ident: Ident = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(ident.id, Snowflake(5));
        assert_eq!(event.kind, EventKind::ChannelDelete);

        let event = SyntheticEvent::presence_remove(Snowflake(9), Snowflake(1), 2, Instant::now());
        let value: serde_json::Value = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(value["user"]["id"], "9");
        assert_eq!(value["guild_id"], "1");
        assert_eq!(event.shard_id, 2);
    }

    #[tokio::test]
    async fn test_emit_delivers_in_order() {
        let (feedback, mut rx) = Feedback::channel(1);
        feedback.emit(vec![
            SyntheticEvent::channel_delete(Snowflake(1), Snowflake(9), 0, Instant::now()),
            SyntheticEvent::channel_delete(Snowflake(2), Snowflake(9), 0, Instant::now()),
        ]);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(String::from_utf8(first.payload).unwrap().contains("\"1\""));
        assert!(String::from_utf8(second.payload).unwrap().contains("\"2\""));
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (feedback, rx) = Feedback::channel(1);
        drop(rx);
        let err = feedback
            .send(SyntheticEvent::channel_delete(Snowflake(1), Snowflake(2), 0, Instant::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::FeedbackClosed));
    }

    #[test]
    fn test_emit_without_runtime_uses_try_send() {
        let (feedback, mut rx) = Feedback::channel(4);
        feedback.emit(vec![SyntheticEvent::presence_remove(Snowflake(3), Snowflake(1), 0, Instant::now())]);
        assert!(rx.try_recv().is_ok());
    }
}
