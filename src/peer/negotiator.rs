//! Negotiation state machine
//!
//! Owns one session's state, decides the offer/answer role, sequences the
//! description exchange, drains the candidate queue at the correct moment,
//! and reacts to engine callbacks and relay-delivered events. It is fed by
//! three independent asynchronous actors with no ordering guarantee
//! between them: the relay channel, the local engine, and the remote
//! peer's own state machine.

use crate::config::NegotiationConfig;
use crate::events::{publish, EventSender, SessionEvent};
use crate::peer::candidates::CandidateQueue;
use crate::peer::engine::{
    ConnectionEngine, EngineConnectionState, EngineEvent, EngineFactory, LocalMediaOf, MediaStream,
    RemoteMediaOf,
};
use crate::signaling::protocol::{InboundEvent, OutboundMessage};
use crate::signaling::relay::RelayChannel;
use crate::types::{DescriptionKind, IceCandidate, SessionDescription};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Phase of a negotiation session
///
/// Exactly one state at a time; `Failed` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No negotiation started
    Idle,
    /// Local media capture in progress
    AcquiringMedia,
    /// Offering side ready, waiting for the remote peer to join
    AwaitingNegotiation,
    /// Description exchange in progress
    Negotiating,
    /// Connection established
    Connected,
    /// Session torn down
    Closed,
    /// Terminal failure
    Failed,
}

impl NegotiationState {
    /// Whether the session can never leave this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }
}

/// Candidate buffer plus the flag it synchronizes on
///
/// Both live under one mutex: whether a candidate is applied directly or
/// enqueued is decided under the same lock that the drain holds, so a
/// candidate can neither miss the drain nor be applied ahead of it.
struct PendingCandidates {
    queue: CandidateQueue,
    remote_description_set: bool,
}

/// Negotiation state machine for one session
///
/// Generic over the engine factory and the relay channel so hosts plug in
/// their native engine and transports plug in their relay; tests inject
/// mocks through the same seams.
pub struct Negotiator<F: EngineFactory, R: RelayChannel> {
    connection_id: String,
    peer_id: String,
    config: NegotiationConfig,
    factory: Arc<F>,
    relay: Arc<R>,
    events: EventSender<LocalMediaOf<F>, RemoteMediaOf<F>>,

    state: RwLock<NegotiationState>,
    engine: RwLock<Option<Arc<F::Engine>>>,
    local_media: RwLock<Option<LocalMediaOf<F>>>,
    remote_media: RwLock<Option<RemoteMediaOf<F>>>,
    pending: Mutex<PendingCandidates>,

    /// Set once the confirmed local description has been relayed
    local_description_sent: AtomicBool,

    /// Set once the single end-of-session notification went out
    ended: AtomicBool,

    /// Bounded negotiation watchdog, armed on entering `Negotiating`
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl<F: EngineFactory, R: RelayChannel> Negotiator<F, R> {
    /// Create a state machine for an acked session
    pub fn new(
        connection_id: String,
        peer_id: String,
        config: NegotiationConfig,
        factory: Arc<F>,
        relay: Arc<R>,
        events: EventSender<LocalMediaOf<F>, RemoteMediaOf<F>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection_id,
            peer_id,
            config,
            factory,
            relay,
            events,
            state: RwLock::new(NegotiationState::Idle),
            engine: RwLock::new(None),
            local_media: RwLock::new(None),
            remote_media: RwLock::new(None),
            pending: Mutex::new(PendingCandidates {
                queue: CandidateQueue::new(),
                remote_description_set: false,
            }),
            local_description_sent: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            watchdog: Mutex::new(None),
        })
    }

    /// Session identifier assigned by the relay
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Local peer identifier
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Current phase
    pub async fn state(&self) -> NegotiationState {
        *self.state.read().await
    }

    /// Local capture handle, if acquired
    pub async fn local_media(&self) -> Option<LocalMediaOf<F>> {
        self.local_media.read().await.clone()
    }

    /// Remote-delivered media handle, if attached
    pub async fn remote_media(&self) -> Option<RemoteMediaOf<F>> {
        self.remote_media.read().await.clone()
    }

    /// Number of candidates currently buffered
    pub async fn pending_candidates(&self) -> usize {
        self.pending.lock().await.queue.len()
    }

    /// Start as the offering side
    ///
    /// Captures local media, creates the engine, attaches the media and
    /// waits for `remote-peer-joined` before generating the offer. On
    /// capture failure the session stays unestablished and this returns
    /// `Ok(())`; the observer sees `MediaAcquisitionFailed` and the caller
    /// may retry.
    pub async fn begin_offering(self: &Arc<Self>) -> Result<()> {
        let Some(media) = self.acquire_media().await? else {
            return Ok(());
        };

        let engine = self.install_engine().await?;
        if let Err(e) = engine.attach_local_media(&media).await {
            return Err(self.fail(e).await);
        }

        self.set_state(NegotiationState::AwaitingNegotiation).await;
        info!(
            connection_id = %self.connection_id,
            "offering side ready, awaiting remote peer"
        );
        Ok(())
    }

    /// Start as the answering side with the offer the relay delivered
    ///
    /// Captures local media, creates the engine, applies the remote offer
    /// (draining any buffered candidates), attaches media, and relays the
    /// generated answer. Capture failure behaves as in
    /// [`Self::begin_offering`].
    pub async fn begin_answering(self: &Arc<Self>, remote: SessionDescription) -> Result<()> {
        let Some(media) = self.acquire_media().await? else {
            return Ok(());
        };

        let engine = self.install_engine().await?;
        if let Err(e) = self.apply_remote_description(&engine, &remote).await {
            return Err(self.fail(e).await);
        }
        if let Err(e) = engine.attach_local_media(&media).await {
            return Err(self.fail(e).await);
        }
        if let Err(e) = self
            .send_local_description(&engine, DescriptionKind::Answer)
            .await
        {
            return Err(self.fail(e).await);
        }

        self.enter_negotiating().await;
        Ok(())
    }

    /// Dispatch one relay-delivered event
    pub async fn handle_event(self: &Arc<Self>, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::RemotePeerJoined => self.handle_peer_joined().await,
            InboundEvent::RemoteDescription { sdp } => self.handle_remote_description(sdp).await,
            InboundEvent::RemoteCandidate { candidate } => {
                self.handle_remote_candidate(candidate).await
            }
            InboundEvent::RemoteSessionStopped => {
                debug!(connection_id = %self.connection_id, "remote peer stopped the session");
                self.stop().await;
                Ok(())
            }
        }
    }

    /// Tear the session down
    ///
    /// Always safe: stops local media tracks, closes the engine and emits
    /// `SessionEnded` once. Calling it again, or with no engine or media
    /// in place, is a no-op.
    pub async fn stop(&self) {
        self.teardown(NegotiationState::Closed).await;
    }

    // ---- start path -----------------------------------------------------

    /// `Idle -> AcquiringMedia` and capture; `Ok(None)` means capture
    /// failed and the session went back to `Idle`
    async fn acquire_media(&self) -> Result<Option<LocalMediaOf<F>>> {
        {
            let mut state = self.state.write().await;
            if *state != NegotiationState::Idle {
                return Err(Error::InvalidState(format!(
                    "cannot start negotiation from {:?}",
                    *state
                )));
            }
            *state = NegotiationState::AcquiringMedia;
        }

        match self.factory.capture_media(&self.config.media).await {
            Ok(media) => {
                *self.local_media.write().await = Some(media.clone());
                publish(
                    &self.events,
                    SessionEvent::LocalMediaReady {
                        connection_id: self.connection_id.clone(),
                        peer_id: self.peer_id.clone(),
                        stream: media.clone(),
                    },
                );
                Ok(Some(media))
            }
            Err(e) => {
                warn!(
                    connection_id = %self.connection_id,
                    "media acquisition failed: {}", e
                );
                publish(
                    &self.events,
                    SessionEvent::MediaAcquisitionFailed {
                        connection_id: self.connection_id.clone(),
                        peer_id: self.peer_id.clone(),
                        error: e.to_string(),
                    },
                );
                self.set_state(NegotiationState::Idle).await;
                Ok(None)
            }
        }
    }

    /// Create a fresh engine and spawn its event pump
    async fn install_engine(self: &Arc<Self>) -> Result<Arc<F::Engine>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = match self.factory.create_engine(tx).await {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e).await),
        };
        *self.engine.write().await = Some(engine.clone());

        // The pump holds a weak reference so a dropped session ends it;
        // it also ends when the engine (the only sender) goes away.
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(this) = weak.upgrade() else { break };
                this.handle_engine_event(event).await;
            }
        });

        Ok(engine)
    }

    // ---- relay-delivered events -----------------------------------------

    /// The relay paired a second peer into the session; generate the offer
    async fn handle_peer_joined(self: &Arc<Self>) -> Result<()> {
        if self.state().await != NegotiationState::AwaitingNegotiation {
            debug!(
                connection_id = %self.connection_id,
                "ignoring remote-peer-joined outside AwaitingNegotiation"
            );
            return Ok(());
        }

        let engine = self.engine().await?;
        if let Err(e) = self
            .send_local_description(&engine, DescriptionKind::Offer)
            .await
        {
            return Err(self.fail(e).await);
        }

        self.enter_negotiating().await;
        Ok(())
    }

    async fn handle_remote_description(
        self: &Arc<Self>,
        remote: SessionDescription,
    ) -> Result<()> {
        let engine = self.engine.read().await.clone();
        let state = self.state().await;

        match (engine, state) {
            // The expected counterpart of our offer arrived; the exchange
            // is symmetric, no new local description is generated.
            (Some(engine), NegotiationState::Negotiating)
                if self.local_description_sent.load(Ordering::SeqCst) =>
            {
                // Renegotiation is not supported; one description each way.
                if self.pending.lock().await.remote_description_set {
                    debug!(
                        connection_id = %self.connection_id,
                        "ignoring repeated remote description"
                    );
                    return Ok(());
                }
                if let Err(e) = self.apply_remote_description(&engine, &remote).await {
                    return Err(self.fail(e).await);
                }
                Ok(())
            }

            // The remote description beat our offer: promote this session
            // from offering to answering.
            (Some(engine), NegotiationState::AwaitingNegotiation) => {
                debug!(
                    connection_id = %self.connection_id,
                    "remote description arrived before local offer, answering instead"
                );
                if let Err(e) = self.apply_remote_description(&engine, &remote).await {
                    return Err(self.fail(e).await);
                }
                if let Err(e) = self
                    .send_local_description(&engine, DescriptionKind::Answer)
                    .await
                {
                    return Err(self.fail(e).await);
                }
                self.enter_negotiating().await;
                Ok(())
            }

            // Pure answering bootstrap: no engine yet, the delivered
            // description initiates the session.
            (None, NegotiationState::Idle) => self.begin_answering(remote).await,

            // Renegotiation is not supported; one description each way.
            (_, state) => {
                debug!(
                    connection_id = %self.connection_id,
                    ?state,
                    "ignoring remote description"
                );
                Ok(())
            }
        }
    }

    async fn handle_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let engine = self.engine.read().await.clone();
        let mut pending = self.pending.lock().await;

        if pending.remote_description_set {
            if let Some(engine) = engine {
                // Applied under the pending lock so it cannot overtake a
                // drain in progress.
                if let Err(e) = engine.add_remote_candidate(&candidate).await {
                    warn!(
                        connection_id = %self.connection_id,
                        "engine rejected remote candidate: {}", e
                    );
                }
            }
        } else {
            debug!(
                connection_id = %self.connection_id,
                "buffering remote candidate until remote description is set"
            );
            pending.queue.enqueue(candidate);
        }

        Ok(())
    }

    // ---- engine events ---------------------------------------------------

    async fn handle_engine_event(self: &Arc<Self>, event: EngineEvent<RemoteMediaOf<F>>) {
        match event {
            EngineEvent::LocalCandidate(candidate) => {
                if self.state().await.is_terminal() {
                    return;
                }
                let message = OutboundMessage::LocalCandidate {
                    connection_id: self.connection_id.clone(),
                    candidate,
                };
                if let Err(e) = self.relay.send(message).await {
                    warn!(
                        connection_id = %self.connection_id,
                        "failed to relay local candidate: {}", e
                    );
                }
            }

            EngineEvent::RemoteMediaAttached(stream) => {
                *self.remote_media.write().await = Some(stream.clone());
                publish(
                    &self.events,
                    SessionEvent::RemoteMediaReady {
                        connection_id: self.connection_id.clone(),
                        peer_id: self.peer_id.clone(),
                        stream,
                    },
                );
            }

            EngineEvent::ConnectionStateChanged(state) => {
                self.handle_connectivity_change(state).await;
            }
        }
    }

    async fn handle_connectivity_change(self: &Arc<Self>, connectivity: EngineConnectionState) {
        debug!(
            connection_id = %self.connection_id,
            ?connectivity,
            "engine connectivity changed"
        );

        match connectivity {
            EngineConnectionState::Connected => {
                let mut state = self.state.write().await;
                if *state == NegotiationState::Negotiating {
                    *state = NegotiationState::Connected;
                    drop(state);
                    info!(connection_id = %self.connection_id, "session connected");
                    self.disarm_watchdog().await;
                }
            }
            EngineConnectionState::Closed => {
                self.teardown(NegotiationState::Closed).await;
            }
            EngineConnectionState::Failed => {
                warn!(connection_id = %self.connection_id, "engine reported connectivity failure");
                self.notify_connection_failed();
                self.teardown(NegotiationState::Failed).await;
            }
            EngineConnectionState::Connecting | EngineConnectionState::Disconnected => {}
        }
    }

    // ---- negotiation steps ----------------------------------------------

    /// Apply the remote description, then drain the candidate queue in
    /// arrival order, all under the pending lock
    async fn apply_remote_description(
        &self,
        engine: &Arc<F::Engine>,
        remote: &SessionDescription,
    ) -> Result<()> {
        engine.set_remote_description(remote).await?;

        let mut pending = self.pending.lock().await;
        pending.remote_description_set = true;
        let buffered = pending.queue.drain();
        if !buffered.is_empty() {
            debug!(
                connection_id = %self.connection_id,
                count = buffered.len(),
                "draining buffered remote candidates"
            );
        }
        for candidate in buffered {
            if let Err(e) = engine.add_remote_candidate(&candidate).await {
                warn!(
                    connection_id = %self.connection_id,
                    "engine rejected buffered candidate: {}", e
                );
            }
        }

        Ok(())
    }

    /// Create, apply and relay the local description
    ///
    /// The description is only announced once the engine confirmed it was
    /// set locally.
    async fn send_local_description(
        &self,
        engine: &Arc<F::Engine>,
        kind: DescriptionKind,
    ) -> Result<()> {
        let description = match kind {
            DescriptionKind::Offer => engine.create_offer().await?,
            DescriptionKind::Answer => engine.create_answer().await?,
        };
        engine.set_local_description(&description).await?;

        let message = OutboundMessage::LocalDescription {
            connection_id: self.connection_id.clone(),
            description,
        };
        if let Err(e) = self.relay.send(message).await {
            warn!(
                connection_id = %self.connection_id,
                "failed to relay local description: {}", e
            );
        }
        self.local_description_sent.store(true, Ordering::SeqCst);
        debug!(connection_id = %self.connection_id, ?kind, "local description relayed");

        Ok(())
    }

    async fn enter_negotiating(self: &Arc<Self>) {
        self.set_state(NegotiationState::Negotiating).await;
        self.arm_watchdog().await;
    }

    // ---- teardown --------------------------------------------------------

    /// Fatal engine failure: tear down and hand the error back
    async fn fail(self: &Arc<Self>, error: Error) -> Error {
        warn!(
            connection_id = %self.connection_id,
            "negotiation failed: {}", error
        );
        self.teardown(NegotiationState::Failed).await;
        error
    }

    /// Idempotent best-effort teardown
    async fn teardown(&self, terminal: NegotiationState) {
        {
            let mut state = self.state.write().await;
            if state.is_terminal() {
                return;
            }
            *state = terminal;
        }

        self.disarm_watchdog().await;

        if let Some(media) = self.local_media.write().await.take() {
            media.stop();
        }
        if let Some(engine) = self.engine.write().await.take() {
            engine.close().await;
        }

        if !self.ended.swap(true, Ordering::SeqCst) {
            info!(connection_id = %self.connection_id, ?terminal, "session ended");
            publish(
                &self.events,
                SessionEvent::SessionEnded {
                    connection_id: self.connection_id.clone(),
                    peer_id: self.peer_id.clone(),
                },
            );
        }
    }

    fn notify_connection_failed(&self) {
        if self.ended.load(Ordering::SeqCst) {
            return;
        }
        publish(
            &self.events,
            SessionEvent::ConnectionFailed {
                connection_id: self.connection_id.clone(),
                peer_id: self.peer_id.clone(),
            },
        );
    }

    // ---- watchdog --------------------------------------------------------

    async fn arm_watchdog(self: &Arc<Self>) {
        let Some(timeout) = self.config.negotiation_timeout() else {
            return;
        };

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(this) = weak.upgrade() else { return };
            if this.state().await != NegotiationState::Negotiating {
                return;
            }
            warn!(
                connection_id = %this.connection_id,
                "negotiation timed out after {:?}", timeout
            );
            // Drop our own handle without aborting so the teardown below
            // is not cancelled from under us.
            this.watchdog.lock().await.take();
            this.notify_connection_failed();
            this.teardown(NegotiationState::Failed).await;
        });

        if let Some(previous) = self.watchdog.lock().await.replace(handle) {
            previous.abort();
        }
    }

    async fn disarm_watchdog(&self) {
        if let Some(handle) = self.watchdog.lock().await.take() {
            handle.abort();
        }
    }

    // ---- helpers ---------------------------------------------------------

    async fn set_state(&self, next: NegotiationState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!(
                connection_id = %self.connection_id,
                "state transition: {:?} -> {:?}", *state, next
            );
            *state = next;
        }
    }

    async fn engine(&self) -> Result<Arc<F::Engine>> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Internal("no engine for this session".to_string()))
    }
}

impl<F: EngineFactory, R: RelayChannel> Drop for Negotiator<F, R> {
    fn drop(&mut self) {
        // Watchdog holds only a weak reference, but there is no point
        // letting the timer run out against a dead session.
        if let Ok(mut guard) = self.watchdog.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
