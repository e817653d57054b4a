use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::{Stream, StreamExt, pin_mut};
use tokio::sync::broadcast::{self, error::RecvError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        now_rfc3339,
        sse::{Handshake, ServerEvent},
    },
    services::sse_events::{EVENT_SLIDE, EVENT_VIEW},
    state::{SharedState, player::PlayerAgent},
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Identifies the target SSE stream for logging once the connection is torn down.
#[derive(Clone, Copy, Debug)]
pub enum StreamKind {
    /// Shared screen.
    Presenter,
    /// Master console.
    Master,
}

impl StreamKind {
    fn as_str(self) -> &'static str {
        match self {
            StreamKind::Presenter => "presenter",
            StreamKind::Master => "master",
        }
    }
}

/// Subscribe to the presenter stream. The current slide is queued first so a
/// new screen does not wait for the next change.
pub fn subscribe_presenter(state: &SharedState) -> (Vec<ServerEvent>, broadcast::Receiver<ServerEvent>) {
    let receiver = state.presenter_sse().subscribe();
    let mut initial = vec![handshake(StreamKind::Presenter.as_str())];
    match ServerEvent::json(Some(EVENT_SLIDE.to_string()), &state.presenter().current()) {
        Ok(event) => initial.push(event),
        Err(err) => warn!(error = %err, "failed to serialize current slide"),
    }
    (initial, receiver)
}

/// Subscribe to the master stream.
pub fn subscribe_master(state: &SharedState) -> (Vec<ServerEvent>, broadcast::Receiver<ServerEvent>) {
    let receiver = state.master_sse().subscribe();
    (vec![handshake(StreamKind::Master.as_str())], receiver)
}

fn handshake(stream: &str) -> ServerEvent {
    let payload = Handshake {
        stream: stream.to_string(),
        message: format!("{stream} stream connected"),
        connected_at: now_rfc3339(),
    };
    ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &payload)
        .unwrap_or_else(|_| ServerEvent {
            event: Some(EVENT_HANDSHAKE.to_string()),
            data: stream.to_string(),
        })
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

fn keep_alive<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    initial: Vec<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            warn!(stream = kind.as_str(), skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(stream = kind.as_str(), "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    keep_alive(ReceiverStream::new(rx))
}

/// Stream every view change of one player.
pub fn player_view_stream(
    agent: Arc<PlayerAgent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let name = agent.name().to_string();

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake("player")))).await.is_err() {
            return;
        }
        let views = agent.views();
        pin_mut!(views);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = views.next() => {
                    let Some(view) = next else { break };
                    match ServerEvent::json(Some(EVENT_VIEW.to_string()), &view) {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(player = %name, error = %err, "failed to serialize player view"),
                    }
                }
            }
        }
        info!(player = %name, "player SSE stream disconnected");
    });

    keep_alive(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;
    use crate::{config::AppConfig, dao::memory_store::MemoryStore, state::AppState};

    async fn first_frame(
        sse: Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>,
    ) -> String {
        let mut body = sse.into_response().into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
            .await
            .expect("no frame before timeout")
            .expect("stream ended")
            .expect("body error");
        String::from_utf8(chunk.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn presenter_stream_opens_with_handshake() {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryStore::new()));
        let (initial, receiver) = subscribe_presenter(&state);
        assert_eq!(initial.len(), 2);

        let frame = first_frame(to_sse_stream(initial, receiver, StreamKind::Presenter)).await;
        assert!(frame.contains("event: handshake"), "{frame}");
        assert!(frame.contains("presenter stream connected"));
    }

    #[tokio::test]
    async fn master_stream_forwards_broadcasts() {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryStore::new()));
        let (_, receiver) = subscribe_master(&state);
        state.master_sse().broadcast(ServerEvent {
            event: Some("phase_changed".into()),
            data: "null".into(),
        });

        let frame = first_frame(to_sse_stream(Vec::new(), receiver, StreamKind::Master)).await;
        assert!(frame.contains("event: phase_changed"), "{frame}");
    }
}
