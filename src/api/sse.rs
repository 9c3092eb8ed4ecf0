//! Server-Sent Events support

use crate::session::{SessionSnapshot, SessionUpdate};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's update channel to an SSE stream, starting with a
/// full snapshot.
///
/// The receiver should be subscribed before the snapshot is taken; clients
/// de-duplicate messages by id.
pub fn sse_stream(
    init: SessionSnapshot,
    updates: broadcast::Receiver<SessionUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&init)) });

    let updates = BroadcastStream::new(updates)
        .filter_map(|result| match result {
            Ok(update) => Some(update),
            Err(_) => None, // Skip lagged updates
        })
        .take_while(|update| *update != SessionUpdate::Ended)
        .map(|update| Ok(update_event(&update)))
        .chain(futures::stream::once(async { Ok(update_event(&SessionUpdate::Ended)) }));

    Sse::new(init.chain(updates)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

fn init_event(snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "session": snapshot,
    });
    Event::default().event("init").data(data.to_string())
}

fn update_event(update: &SessionUpdate) -> Event {
    let (event_type, data) = match update {
        SessionUpdate::Message(message) => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        SessionUpdate::Typing { active } => (
            "typing",
            json!({
                "type": "typing",
                "active": active
            }),
        ),
        SessionUpdate::Ended => (
            "ended",
            json!({
                "type": "ended"
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
