//! Session change notifications. Publishing is fire-and-forget: a lost event
//! only delays a client refetch, so no caller ever waits on or fails from it.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tokio::sync::broadcast;

use crate::metrics::SESSION_EVENTS_PUBLISHED_TOTAL;
use crate::models::SessionEvent;

pub const SESSION_EVENTS_CHANNEL: &str = "session-events";

pub trait SessionNotifier: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

/// In-process fan-out feeding the SSE endpoint.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<SessionEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SessionNotifier for BroadcastNotifier {
    fn notify(&self, event: SessionEvent) {
        // No subscribers is the normal idle state.
        let _ = self.sender.send(event);
        SESSION_EVENTS_PUBLISHED_TOTAL
            .with_label_values(&["broadcast"])
            .inc();
    }
}

/// Publishes events as JSON on a Redis channel for other processes.
pub struct RedisNotifier {
    redis: ConnectionManager,
}

impl RedisNotifier {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

async fn publish(mut conn: ConnectionManager, event: &SessionEvent) -> Result<()> {
    let payload = serde_json::to_string(event).context("Failed to serialize session event")?;
    let _: () = redis::cmd("PUBLISH")
        .arg(SESSION_EVENTS_CHANNEL)
        .arg(&payload)
        .query_async(&mut conn)
        .await
        .context("Failed to publish session event")?;
    Ok(())
}

impl SessionNotifier for RedisNotifier {
    fn notify(&self, event: SessionEvent) {
        let conn = self.redis.clone();
        tokio::spawn(async move {
            match publish(conn, &event).await {
                Ok(()) => {
                    SESSION_EVENTS_PUBLISHED_TOTAL
                        .with_label_values(&["redis"])
                        .inc();
                    tracing::debug!(
                        "Session event published: {} code={}",
                        event.event_name(),
                        event.code()
                    );
                }
                Err(e) => tracing::warn!("Session event not published: {:#}", e),
            }
        });
    }
}

pub struct FanoutNotifier {
    targets: Vec<Arc<dyn SessionNotifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn SessionNotifier>>) -> Self {
        Self { targets }
    }
}

impl SessionNotifier for FanoutNotifier {
    fn notify(&self, event: SessionEvent) {
        for target in &self.targets {
            target.notify(event.clone());
        }
    }
}
