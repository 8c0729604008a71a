use tokio::sync::broadcast;
use tracing::trace;

use crate::dto::sse::ServerEvent;

/// The two fan-out hubs: passive displays and the host panel.
pub struct SseState {
    display: SseHub,
    host: SseHub,
}

impl SseState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            display: SseHub::new("display", capacity),
            host: SseHub::new("host", capacity),
        }
    }

    pub fn display(&self) -> &SseHub {
        &self.display
    }

    pub fn host(&self) -> &SseHub {
        &self.host
    }
}

/// Broadcast channel feeding one kind of SSE stream.
pub struct SseHub {
    stream: &'static str,
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    pub fn new(stream: &'static str, capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { stream, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Fan an event out to connected clients. Dropped when nobody listens.
    pub fn broadcast(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            trace!(stream = self.stream, "no SSE subscriber; event dropped");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
