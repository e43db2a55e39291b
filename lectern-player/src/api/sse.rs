//! Server-Sent Events (SSE) broadcaster
//!
//! Each client first receives the current snapshot (`PlaybackSnapshot`
//! event), then every bus event named by its type.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let view = ctx.player.bind_view();
    let initial = snapshot_event(&view.snapshot());
    let (_state, rx) = view.into_parts();

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged client: it skips ahead to the newest events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = stream::iter(initial.map(Ok::<_, Infallible>)).chain(events);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn snapshot_event(snapshot: &lectern_common::PlaybackSnapshot) -> Option<Event> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Event::default().event("PlaybackSnapshot").data(json)),
        Err(e) => {
            warn!("Failed to serialize snapshot: {}", e);
            None
        }
    }
}
