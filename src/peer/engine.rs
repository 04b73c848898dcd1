//! Connection engine capability
//!
//! Thin interface over the native peer-connection object. The state machine
//! drives it but never implements it; the host environment supplies the
//! implementation (see [`crate::peer::webrtc`] for the webrtc-rs one).

use crate::types::{IceCandidate, MediaConstraints, SessionDescription};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to a captured or remote-delivered media stream
///
/// Handles are non-owning: the engine owns the underlying resources and the
/// session only keeps a reference for notification and teardown.
pub trait MediaStream: Clone + Send + Sync + 'static {
    /// Stream identifier
    fn id(&self) -> &str;

    /// Stop all tracks; idempotent, never raises
    fn stop(&self);
}

/// Connectivity phases reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineConnectionState {
    /// Connectivity checks in progress
    Connecting,
    /// Direct path established
    Connected,
    /// Path lost, may recover
    Disconnected,
    /// Engine closed, connection ended
    Closed,
    /// Terminal connectivity failure
    Failed,
}

/// Asynchronous notifications from the engine
#[derive(Debug, Clone)]
pub enum EngineEvent<R> {
    /// A local connectivity candidate was discovered
    LocalCandidate(IceCandidate),

    /// The remote peer's media was attached
    RemoteMediaAttached(R),

    /// The connectivity state changed
    ConnectionStateChanged(EngineConnectionState),
}

/// Sending half of an engine's event channel
pub type EngineEventSender<R> = mpsc::UnboundedSender<EngineEvent<R>>;

/// Receiving half of an engine's event channel
pub type EngineEventReceiver<R> = mpsc::UnboundedReceiver<EngineEvent<R>>;

/// Capability surface the state machine requires from the native engine
///
/// Every operation is a discrete async step; the state machine does not
/// proceed to a dependent step until the prior one resolves.
#[async_trait]
pub trait ConnectionEngine: Send + Sync + 'static {
    /// Local capture handle type
    type LocalMedia: MediaStream;

    /// Remote-delivered media handle type
    type RemoteMedia: Clone + Send + Sync + 'static;

    /// Produce a local offer description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Produce a local answer description
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply the remote peer's description
    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply a remote connectivity candidate
    ///
    /// Only valid after `set_remote_description` has resolved; the state
    /// machine enforces this through its candidate queue.
    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Associate captured local media with the outgoing negotiation
    async fn attach_local_media(&self, media: &Self::LocalMedia) -> Result<()>;

    /// Release all engine resources; idempotent, never raises
    async fn close(&self);
}

/// Factory for engines and local media capture
///
/// A new negotiation always creates a fresh engine instance; a closed
/// engine is never reused.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    /// The engine type this factory produces
    type Engine: ConnectionEngine;

    /// Capture local media from the environment
    async fn capture_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<<Self::Engine as ConnectionEngine>::LocalMedia>;

    /// Create a fresh engine wired to the given event sender
    async fn create_engine(
        &self,
        events: EngineEventSender<<Self::Engine as ConnectionEngine>::RemoteMedia>,
    ) -> Result<Arc<Self::Engine>>;
}

/// Local media handle type produced by a factory
pub type LocalMediaOf<F> = <<F as EngineFactory>::Engine as ConnectionEngine>::LocalMedia;

/// Remote media handle type produced by a factory
pub type RemoteMediaOf<F> = <<F as EngineFactory>::Engine as ConnectionEngine>::RemoteMedia;
