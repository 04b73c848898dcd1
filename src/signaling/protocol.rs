//! Relay message contract
//!
//! Tagged unions for everything exchanged with the remote peer through the
//! relay. Malformed or unknown payloads are rejected here, at the boundary;
//! the state machine only ever sees well-formed events.

use crate::types::{IceCandidate, SessionDescription};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Messages sent to the relay, fire-and-forget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Announce the confirmed local description to the remote peer
    LocalDescription {
        /// Session this message belongs to
        connection_id: String,
        /// The local offer or answer
        description: SessionDescription,
    },

    /// Trickle a locally discovered connectivity candidate
    LocalCandidate {
        /// Session this message belongs to
        connection_id: String,
        /// The discovered candidate
        candidate: IceCandidate,
    },
}

impl OutboundMessage {
    /// Session identifier carried by this message
    pub fn connection_id(&self) -> &str {
        match self {
            OutboundMessage::LocalDescription { connection_id, .. }
            | OutboundMessage::LocalCandidate { connection_id, .. } => connection_id,
        }
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Protocol(format!("failed to serialize outbound message: {}", e)))
    }
}

/// Events delivered by the relay for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A second peer joined the session; the offering side may now
    /// generate its description
    RemotePeerJoined,

    /// The remote peer's description arrived
    RemoteDescription {
        /// Remote offer or answer
        sdp: SessionDescription,
    },

    /// A remote connectivity candidate arrived
    RemoteCandidate {
        /// The trickled candidate
        candidate: IceCandidate,
    },

    /// The remote peer stopped the session
    RemoteSessionStopped,
}

impl InboundEvent {
    /// Parse an inbound event, rejecting malformed or unknown payloads
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for anything that is not a known,
    /// fully-populated event. Callers drop rejected input; it never
    /// reaches the state machine.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Protocol(format!("malformed inbound event: {}", e)))
    }
}

/// Relay response to a session start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAck {
    /// Identifier correlating all further messages to this session
    pub connection_id: String,

    /// Whether the relay created the session (true) or paired this peer
    /// into an existing one (false)
    pub is_new: bool,
}
