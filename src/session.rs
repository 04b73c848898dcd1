//! Session façade
//!
//! Maps the caller-facing connect/stop surface onto a negotiation engine
//! instance and routes relay-delivered events into it.

use crate::config::NegotiationConfig;
use crate::events::EventSender;
use crate::peer::engine::{EngineFactory, LocalMediaOf, RemoteMediaOf};
use crate::peer::negotiator::{NegotiationState, Negotiator};
use crate::signaling::protocol::InboundEvent;
use crate::signaling::relay::RelayChannel;
use crate::types::SessionDescription;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for starting a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Ask the relay to pair into this existing session; `None` requests
    /// a fresh one
    pub connection_id: Option<String>,

    /// Start as the answering side with this already-delivered offer
    pub remote_description: Option<SessionDescription>,

    /// Local peer identifier; auto-generated if `None`
    pub peer_id: Option<String>,
}

/// One negotiated connection
///
/// Created through [`Session::connect`]; destroyed by [`Session::stop`],
/// by the remote peer stopping, or by an unrecoverable engine failure.
pub struct Session<F: EngineFactory, R: RelayChannel> {
    negotiator: Arc<Negotiator<F, R>>,
    relay: Arc<R>,
    initial_remote: Option<SessionDescription>,
}

impl<F: EngineFactory, R: RelayChannel> Session<F, R> {
    /// Start a session
    ///
    /// Asks the relay to create or pair the session, then begins
    /// negotiation in the role implied by the options: answering when a
    /// remote description is supplied, offering otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the relay rejects session
    /// creation, or the engine fails while setting up. A media capture
    /// failure does not fail the call; the observer is notified and
    /// [`Session::retry`] may be used.
    pub async fn connect(
        factory: Arc<F>,
        relay: Arc<R>,
        config: NegotiationConfig,
        options: SessionOptions,
        events: EventSender<LocalMediaOf<F>, RemoteMediaOf<F>>,
    ) -> Result<Self> {
        config.validate()?;

        let ack = relay.start_session(options.connection_id.as_deref()).await?;
        info!(
            connection_id = %ack.connection_id,
            is_new = ack.is_new,
            "relay acknowledged session"
        );

        let peer_id = options
            .peer_id
            .unwrap_or_else(|| format!("peer-{}", uuid::Uuid::new_v4()));
        let negotiator = Negotiator::new(
            ack.connection_id,
            peer_id,
            config,
            factory,
            relay.clone(),
            events,
        );

        let started = match &options.remote_description {
            Some(remote) => negotiator.begin_answering(remote.clone()).await,
            None => negotiator.begin_offering().await,
        };
        if let Err(e) = started {
            // The relay already acked; release its side of the session.
            if let Err(stop_err) = relay.stop_session(negotiator.connection_id()).await {
                warn!(
                    connection_id = %negotiator.connection_id(),
                    "failed to notify relay of stop: {}", stop_err
                );
            }
            return Err(e);
        }

        Ok(Self {
            negotiator,
            relay,
            initial_remote: options.remote_description,
        })
    }

    /// Session identifier assigned by the relay
    pub fn id(&self) -> &str {
        self.negotiator.connection_id()
    }

    /// Local peer identifier
    pub fn peer_id(&self) -> &str {
        self.negotiator.peer_id()
    }

    /// Current negotiation phase
    pub async fn state(&self) -> NegotiationState {
        self.negotiator.state().await
    }

    /// The negotiation state machine backing this session
    pub fn negotiator(&self) -> &Arc<Negotiator<F, R>> {
        &self.negotiator
    }

    /// Dispatch one relay-delivered event into the state machine
    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        self.negotiator.handle_event(event).await
    }

    /// Parse and dispatch a raw relay payload
    ///
    /// Malformed or unknown payloads are rejected at this boundary and
    /// dropped; they never reach the state machine.
    pub async fn handle_raw(&self, json: &str) -> Result<()> {
        match InboundEvent::from_json(json) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                debug!(connection_id = %self.id(), "dropping inbound payload: {}", e);
                Ok(())
            }
        }
    }

    /// Retry negotiation after a media acquisition failure
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the session is back in `Idle`.
    pub async fn retry(&self) -> Result<()> {
        if self.state().await != NegotiationState::Idle {
            return Err(Error::InvalidState(
                "retry is only valid after a media acquisition failure".to_string(),
            ));
        }
        match &self.initial_remote {
            Some(remote) => self.negotiator.begin_answering(remote.clone()).await,
            None => self.negotiator.begin_offering().await,
        }
    }

    /// Stop the session
    ///
    /// Local teardown always succeeds; the relay is notified best-effort.
    pub async fn stop(&self) {
        let already_terminal = self.state().await.is_terminal();
        self.negotiator.stop().await;

        if !already_terminal {
            if let Err(e) = self.relay.stop_session(self.id()).await {
                warn!(connection_id = %self.id(), "failed to notify relay of stop: {}", e);
            }
        }
    }
}
