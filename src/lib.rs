//! Relay-mediated WebRTC offer/answer negotiation engine
//!
//! Negotiates a peer-to-peer media connection between two endpoints that
//! cannot reach each other directly: offer/answer exchange plus trickled
//! connectivity candidates through a relay channel, then hand-off to a
//! native peer-connection engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Session (connect / stop façade)                     │
//! │  └─ Negotiator (per-session state machine)           │
//! │     ├─ RelayChannel    (offer/answer + candidates)   │
//! │     ├─ ConnectionEngine (native peer connection)     │
//! │     ├─ CandidateQueue  (candidate-before-description │
//! │     │                   race absorber)               │
//! │     └─ SessionEvent channel (per-session observer)   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Data flow is unidirectional per hop: relay events feed the state
//! machine which drives the engine; engine events feed the state machine
//! which emits relay messages and observer notifications. Each session is
//! fully independent; there is no cross-session shared state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use icebreaker_peer::{
//!     session_events, NegotiationConfig, Session, SessionOptions, WebRtcEngineFactory,
//! };
//! # use icebreaker_peer::RelayChannel;
//!
//! # async fn example(relay: Arc<impl RelayChannel>) -> icebreaker_peer::Result<()> {
//! let config = NegotiationConfig::default();
//! let factory = Arc::new(WebRtcEngineFactory::new(config.clone())?);
//! let (events, mut observer) = session_events();
//!
//! // Offer side: no remote description supplied.
//! let session = Session::connect(
//!     factory,
//!     relay,
//!     config,
//!     SessionOptions::default(),
//!     events,
//! )
//! .await?;
//!
//! // Feed relay-delivered payloads as they arrive.
//! session.handle_raw(r#"{"event":"remote_peer_joined"}"#).await?;
//!
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod types;

// Re-exports for public API
pub use config::{NegotiationConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use events::{session_events, EventReceiver, EventSender, SessionEvent};
pub use peer::{
    CandidateQueue, ConnectionEngine, EngineConnectionState, EngineEvent, EngineFactory,
    MediaStream, NegotiationState, Negotiator, WebRtcEngine, WebRtcEngineFactory,
    WebRtcLocalMedia, WebRtcRemoteMedia,
};
pub use session::{Session, SessionOptions};
pub use signaling::{InboundEvent, OutboundMessage, RelayChannel, SessionAck};
pub use types::{DescriptionKind, IceCandidate, MediaConstraints, SessionDescription};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
