//! Session event notifier
//!
//! One-way publish mechanism the state machine uses to announce milestones
//! to external observers. Each session owns its own channel; there is no
//! process-wide event registry.

use tokio::sync::mpsc;
use tracing::trace;

/// Milestones announced by a negotiation session
///
/// Generic over the engine's local (`L`) and remote (`R`) media handle
/// types. Every variant carries the connection and peer identifiers so an
/// observer watching several sessions can tell them apart.
#[derive(Debug, Clone)]
pub enum SessionEvent<L, R> {
    /// Local capture succeeded; the stream handle is non-owning
    LocalMediaReady {
        /// Relay-assigned session identifier
        connection_id: String,
        /// Local peer identifier
        peer_id: String,
        /// Captured local stream
        stream: L,
    },

    /// The engine attached media delivered by the remote peer
    RemoteMediaReady {
        /// Relay-assigned session identifier
        connection_id: String,
        /// Local peer identifier
        peer_id: String,
        /// Remote-delivered stream
        stream: R,
    },

    /// Local capture was denied or unavailable; the session stays
    /// unestablished and the caller may retry
    MediaAcquisitionFailed {
        /// Relay-assigned session identifier
        connection_id: String,
        /// Local peer identifier
        peer_id: String,
        /// Capture error detail
        error: String,
    },

    /// The engine reported terminal connectivity failure or the
    /// negotiation watchdog expired; always followed by `SessionEnded`
    ConnectionFailed {
        /// Relay-assigned session identifier
        connection_id: String,
        /// Local peer identifier
        peer_id: String,
    },

    /// The session was torn down; emitted at most once per session
    SessionEnded {
        /// Relay-assigned session identifier
        connection_id: String,
        /// Local peer identifier
        peer_id: String,
    },
}

impl<L, R> SessionEvent<L, R> {
    /// Connection identifier carried by this event
    pub fn connection_id(&self) -> &str {
        match self {
            SessionEvent::LocalMediaReady { connection_id, .. }
            | SessionEvent::RemoteMediaReady { connection_id, .. }
            | SessionEvent::MediaAcquisitionFailed { connection_id, .. }
            | SessionEvent::ConnectionFailed { connection_id, .. }
            | SessionEvent::SessionEnded { connection_id, .. } => connection_id,
        }
    }
}

/// Sending half of a session's event channel
pub type EventSender<L, R> = mpsc::UnboundedSender<SessionEvent<L, R>>;

/// Receiving half of a session's event channel
pub type EventReceiver<L, R> = mpsc::UnboundedReceiver<SessionEvent<L, R>>;

/// Create a per-session observer channel
pub fn session_events<L, R>() -> (EventSender<L, R>, EventReceiver<L, R>) {
    mpsc::unbounded_channel()
}

/// Publish an event, ignoring a dropped observer
///
/// Notifications are fire-and-forget; an observer that went away must not
/// disturb the session.
pub(crate) fn publish<L, R>(sender: &EventSender<L, R>, event: SessionEvent<L, R>) {
    if sender.send(event).is_err() {
        trace!("session observer dropped, event discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (tx, mut rx) = session_events::<(), ()>();
        publish(
            &tx,
            SessionEvent::ConnectionFailed {
                connection_id: "c1".to_string(),
                peer_id: "p1".to_string(),
            },
        );
        publish(
            &tx,
            SessionEvent::SessionEnded {
                connection_id: "c1".to_string(),
                peer_id: "p1".to_string(),
            },
        );

        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::ConnectionFailed { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::SessionEnded { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_survives_dropped_observer() {
        let (tx, rx) = session_events::<(), ()>();
        drop(rx);
        publish(
            &tx,
            SessionEvent::SessionEnded {
                connection_id: "c1".to_string(),
                peer_id: "p1".to_string(),
            },
        );
    }

    #[test]
    fn test_connection_id_accessor() {
        let event: SessionEvent<(), ()> = SessionEvent::MediaAcquisitionFailed {
            connection_id: "c7".to_string(),
            peer_id: "p1".to_string(),
            error: "denied".to_string(),
        };
        assert_eq!(event.connection_id(), "c7");
    }
}
