use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        snapshot::{DisplaySnapshot, HostSnapshot},
        sse::{Handshake, ServerEvent},
    },
    services::sse_events::EVENT_SNAPSHOT,
    state::SharedState,
};

/// Identifies the target SSE stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Display,
    Host,
}

impl StreamKind {
    fn name(self) -> &'static str {
        match self {
            StreamKind::Display => "display",
            StreamKind::Host => "host",
        }
    }
}

/// A live subscription plus the events a fresh client needs before the first broadcast.
pub struct StreamSubscription {
    pub receiver: broadcast::Receiver<ServerEvent>,
    pub initial: Vec<ServerEvent>,
    pub kind: StreamKind,
}

/// Subscribe to the display stream. The current display snapshot is replayed first so late
/// joiners render immediately.
pub fn subscribe_display(state: &SharedState) -> StreamSubscription {
    let receiver = state.display_sse().subscribe();
    let snapshot = DisplaySnapshot::build(&state.sync().current(), state.config());
    StreamSubscription {
        receiver,
        initial: initial_events(state, StreamKind::Display, &snapshot),
        kind: StreamKind::Display,
    }
}

/// Subscribe to the host stream, replaying the full host snapshot first.
pub fn subscribe_host(state: &SharedState) -> StreamSubscription {
    let receiver = state.host_sse().subscribe();
    let snapshot =
        HostSnapshot::build(&state.sync().current(), state.config(), state.is_degraded());
    StreamSubscription {
        receiver,
        initial: initial_events(state, StreamKind::Host, &snapshot),
        kind: StreamKind::Host,
    }
}

fn initial_events(
    state: &SharedState,
    kind: StreamKind,
    snapshot: &impl serde::Serialize,
) -> Vec<ServerEvent> {
    let handshake = Handshake {
        stream: kind.name().to_string(),
        message: format!("{} stream connected", kind.name()),
        degraded: state.is_degraded(),
        loading: state.sync().current().is_loading(),
    };

    [
        ServerEvent::json(Some("handshake".to_string()), &handshake),
        ServerEvent::json(Some(EVENT_SNAPSHOT.to_string()), snapshot),
    ]
    .into_iter()
    .filter_map(|event| {
        event
            .inspect_err(|err| warn!(error = %err, "failed to serialize initial SSE payload"))
            .ok()
    })
    .collect()
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a subscription into an SSE response, forwarding events until the client
/// disconnects.
pub fn to_sse_stream(
    subscription: StreamSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let StreamSubscription {
        mut receiver,
        initial,
        kind,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: replays the initial events, then reads from broadcast
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
                            // The next snapshot event carries the full state again.
                            warn!(stream = kind.name(), skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(stream = kind.name(), "SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::QuizConfig,
        services::{auth::StaticAuth, question_bank::LocalQuestionBank},
        state::AppState,
    };

    #[tokio::test]
    async fn new_subscribers_get_handshake_then_snapshot() {
        let state = AppState::new(
            QuizConfig::default(),
            Arc::new(LocalQuestionBank::default()),
            Arc::new(StaticAuth::anonymous()),
        );

        let subscription = subscribe_display(&state);
        let names: Vec<_> = subscription
            .initial
            .iter()
            .map(|event| event.event.as_deref())
            .collect();
        assert_eq!(names, vec![Some("handshake"), Some(EVENT_SNAPSHOT)]);
        assert!(subscription.initial[0].data.contains("\"degraded\":true"));
        assert_eq!(state.display_sse().receiver_count(), 1);
    }
}
