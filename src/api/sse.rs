//! Server-Sent Events support

use crate::runtime::SessionUpdate;
use crate::session::SessionState;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Stream the current snapshot, then every update
pub fn sse_stream(
    initial: SessionState,
    updates: broadcast::Receiver<SessionUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(to_sse_event(SessionUpdate::Snapshot(initial)))
    });

    let broadcasts = BroadcastStream::new(updates).filter_map(|result| match result {
        Ok(update) => Some(Ok(to_sse_event(update))),
        Err(e) => {
            // A lagging client misses intermediate snapshots; the next one catches it up
            tracing::debug!(error = %e, "SSE subscriber lagged");
            None
        }
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_sse_event(update: SessionUpdate) -> Event {
    let (event_type, data) = match update {
        SessionUpdate::Snapshot(state) => (
            "snapshot",
            json!({
                "type": "snapshot",
                "state": state
            }),
        ),
        SessionUpdate::Notification(notification) => (
            "notification",
            json!({
                "type": "notification",
                "notification": notification
            }),
        ),
        SessionUpdate::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
