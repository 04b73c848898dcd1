//! Negotiation core: candidate queue, engine capability, state machine

pub mod candidates;
pub mod engine;
pub mod negotiator;
pub mod webrtc;

pub use candidates::CandidateQueue;
pub use engine::{
    ConnectionEngine, EngineConnectionState, EngineEvent, EngineEventReceiver, EngineEventSender,
    EngineFactory, LocalMediaOf, MediaStream, RemoteMediaOf,
};
pub use negotiator::{NegotiationState, Negotiator};
pub use webrtc::{WebRtcEngine, WebRtcEngineFactory, WebRtcLocalMedia, WebRtcRemoteMedia};
