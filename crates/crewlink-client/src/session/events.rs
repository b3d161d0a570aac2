//! Typed session signals for the presentation layer.
//!
//! The core never navigates; it emits [`SessionEvent::Invalidated`] and
//! whatever shell hosts the client decides how to react (usually by
//! showing the sign-in screen).

use tokio::sync::broadcast;

/// Why a session was invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationReason {
    /// Refresh (and any fallback) was rejected as unrecoverable.
    RefreshRejected,
    /// The retried request still came back 401/403 after a refresh.
    RetryUnauthorized,
    /// The user signed out locally.
    SignedOut,
}

/// Signals emitted by the session coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Invalidated { reason: InvalidationReason },
}

/// Broadcast bus for session signals.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        SessionEvents { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        events.emit(SessionEvent::Invalidated {
            reason: InvalidationReason::SignedOut,
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Invalidated {
                reason: InvalidationReason::SignedOut
            }
        );
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        SessionEvents::new().emit(SessionEvent::Invalidated {
            reason: InvalidationReason::RefreshRejected,
        });
    }
}
