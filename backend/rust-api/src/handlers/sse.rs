use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::AppResult,
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::SessionEvent,
    services::{session_service::SessionService, AppState},
};

/// SSE endpoint for session change hints
/// GET /api/v1/sessions/code/{code}/events
pub async fn session_events(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Verify session exists
    SessionService::new(state.store.clone(), state.notifier.clone())
        .by_code(&code)
        .await?;

    tracing::info!("Client connected to session event stream: code={}", code);
    let stream = session_event_stream(state.events.subscribe(), code);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Keeps the connection gauge accurate however the stream ends.
struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Events for `code` only, in publish order, until the channel closes.
fn session_event_stream(
    receiver: broadcast::Receiver<SessionEvent>,
    code: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (receiver, code, ConnectionGuard::open()),
        |(mut receiver, code, guard)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.code() == code => {
                        let sse = Event::default()
                            .event(event.event_name())
                            .data(event.to_sse_data());
                        return Some((Ok(sse), (receiver, code, guard)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        // Hints only; the client refetches on the next one.
                        tracing::warn!("SSE client for {} lagged by {} events", code, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Session event stream closed: code={}", code);
                        return None;
                    }
                }
            }
        },
    )
}
