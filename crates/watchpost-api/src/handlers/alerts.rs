//! Server-sent alert stream.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::warn;
use watchpost_worker::AlertNotice;

use crate::metrics;
use crate::state::AppState;

/// Decrements the active stream gauge when the client goes away.
struct StreamGuard;

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::alert_stream_closed();
    }
}

/// Stream every alert notice as an `alert` event until the server shuts down.
pub async fn alert_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    metrics::alert_stream_opened();
    let notices = state.supervisor.subscribe_alerts();
    let events = notice_events(notices, state.shutdown.clone(), StreamGuard);
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn notice_events(
    notices: broadcast::Receiver<AlertNotice>,
    shutdown: watch::Receiver<bool>,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let state = (notices, shutdown, guard);
    stream::unfold(state, |(mut notices, mut shutdown, guard)| async move {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            let received = tokio::select! {
                received = notices.recv() => received,
                changed = shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => return None,
                },
            };
            match received {
                Ok(notice) => {
                    let event = match Event::default().event("alert").json_data(&notice) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Failed to serialize alert notice: {}", e);
                            continue;
                        }
                    };
                    return Some((Ok(event), (notices, shutdown, guard)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Alert stream subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
