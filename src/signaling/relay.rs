//! Relay channel capability
//!
//! The relay is an external collaborator: a reliable, ordered,
//! bidirectional message channel with request/response and fire-and-forget
//! support. This crate only defines the boundary; transports implement it.

use crate::signaling::protocol::{OutboundMessage, SessionAck};
use crate::Result;
use async_trait::async_trait;

/// Capability surface the state machine requires from the relay
#[async_trait]
pub trait RelayChannel: Send + Sync + 'static {
    /// Request session creation or pairing
    ///
    /// Passing an existing `connection_id` asks the relay to pair this
    /// peer into that session; `None` asks for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `Error::RelayRejected` if the relay declines; the failure
    /// is surfaced to the caller and no retry is attempted.
    async fn start_session(&self, connection_id: Option<&str>) -> Result<SessionAck>;

    /// Tell the relay the session is over (best-effort)
    async fn stop_session(&self, connection_id: &str) -> Result<()>;

    /// Send a fire-and-forget message to the remote peer
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}
