use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    presenter: SseHub,
    master: SseHub,
}

impl SseState {
    /// Build the SSE sub-tree; every hub gets the same channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            presenter: SseHub::new(capacity),
            master: SseHub::new(capacity),
        }
    }

    /// Hub feeding the shared presenter screen.
    pub fn presenter(&self) -> &SseHub {
        &self.presenter
    }

    /// Hub feeding the master console.
    pub fn master(&self) -> &SseHub {
        &self.master
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of connected subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
