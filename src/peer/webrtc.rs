//! webrtc-rs backed connection engine
//!
//! Production implementation of the engine capability over
//! `webrtc::RTCPeerConnection`. Local media is exposed as static sample
//! tracks the application feeds; capture devices stay the host's concern.

use crate::config::NegotiationConfig;
use crate::peer::engine::{
    ConnectionEngine, EngineConnectionState, EngineEvent, EngineEventSender, EngineFactory,
    MediaStream,
};
use crate::types::{IceCandidate, MediaConstraints, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Handle to locally captured media
///
/// Holds Opus/VP8 sample tracks created per the session's constraints.
/// `stop` only marks the handle; sample writers must check
/// [`WebRtcLocalMedia::is_stopped`] before feeding further samples.
#[derive(Clone)]
pub struct WebRtcLocalMedia {
    id: String,
    audio: Option<Arc<TrackLocalStaticSample>>,
    video: Option<Arc<TrackLocalStaticSample>>,
    stopped: Arc<AtomicBool>,
}

impl WebRtcLocalMedia {
    /// Audio sample track, if requested
    pub fn audio_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.audio.as_ref()
    }

    /// Video sample track, if requested
    pub fn video_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.video.as_ref()
    }

    /// Whether the tracks were stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaStream for WebRtcLocalMedia {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for WebRtcLocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebRtcLocalMedia")
            .field("id", &self.id)
            .field("audio", &self.audio.is_some())
            .field("video", &self.video.is_some())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Handle to a remote-delivered track
#[derive(Clone)]
pub struct WebRtcRemoteMedia {
    id: String,
    track: Arc<TrackRemote>,
}

impl WebRtcRemoteMedia {
    /// Track identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The underlying remote track
    pub fn track(&self) -> &Arc<TrackRemote> {
        &self.track
    }
}

impl fmt::Debug for WebRtcRemoteMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebRtcRemoteMedia")
            .field("id", &self.id)
            .finish()
    }
}

/// Engine factory over webrtc-rs
pub struct WebRtcEngineFactory {
    config: NegotiationConfig,
}

impl WebRtcEngineFactory {
    /// Create a factory for the given configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the configuration is invalid.
    pub fn new(config: NegotiationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn ice_servers(&self) -> Vec<RTCIceServer> {
        self.config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(self.config.turn_servers.iter().map(|turn| {
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                }
            }))
            .collect()
    }
}

#[async_trait]
impl EngineFactory for WebRtcEngineFactory {
    type Engine = WebRtcEngine;

    async fn capture_media(&self, constraints: &MediaConstraints) -> Result<WebRtcLocalMedia> {
        let stream_id = format!("stream-{}", uuid::Uuid::new_v4());

        let audio = constraints.audio.then(|| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                format!("audio-{}", stream_id),
                stream_id.clone(),
            ))
        });

        let video = constraints.video.then(|| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "video/VP8".to_string(),
                    // Standard 90kHz clock for video
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                format!("video-{}", stream_id),
                stream_id.clone(),
            ))
        });

        debug!(stream_id = %stream_id, audio = audio.is_some(), video = video.is_some(),
            "local media prepared");

        Ok(WebRtcLocalMedia {
            id: stream_id,
            audio,
            video,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn create_engine(
        &self,
        events: EngineEventSender<WebRtcRemoteMedia>,
    ) -> Result<Arc<WebRtcEngine>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Engine(format!("failed to register codecs: {}", e)))?;

        let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| Error::Engine(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers(),
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::Engine(format!("failed to create peer connection: {}", e)))?,
        );

        let candidate_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = candidate_tx.clone();
            Box::pin(async move {
                // None marks the end of gathering
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(EngineEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        let track_tx = events.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tx = track_tx.clone();
            Box::pin(async move {
                let media = WebRtcRemoteMedia {
                    id: track.id(),
                    track,
                };
                let _ = tx.send(EngineEvent::RemoteMediaAttached(media));
            })
        }));

        let state_tx = events;
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let mapped = match state {
                RTCPeerConnectionState::Connecting => Some(EngineConnectionState::Connecting),
                RTCPeerConnectionState::Connected => Some(EngineConnectionState::Connected),
                RTCPeerConnectionState::Disconnected => Some(EngineConnectionState::Disconnected),
                RTCPeerConnectionState::Closed => Some(EngineConnectionState::Closed),
                RTCPeerConnectionState::Failed => Some(EngineConnectionState::Failed),
                _ => None,
            };
            if let Some(state) = mapped {
                let _ = state_tx.send(EngineEvent::ConnectionStateChanged(state));
            }
            Box::pin(async {})
        }));

        Ok(Arc::new(WebRtcEngine {
            pc,
            senders: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection engine over a webrtc-rs peer connection
pub struct WebRtcEngine {
    pc: Arc<RTCPeerConnection>,

    /// RTP senders retained so the tracks are not cleaned up
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,

    closed: AtomicBool,
}

fn to_rtc_description(description: &SessionDescription) -> Result<RTCSessionDescription> {
    let result = match description.kind {
        crate::types::DescriptionKind::Offer => RTCSessionDescription::offer(description.sdp.clone()),
        crate::types::DescriptionKind::Answer => {
            RTCSessionDescription::answer(description.sdp.clone())
        }
    };
    result.map_err(|e| Error::Sdp(format!("failed to parse description: {}", e)))
}

#[async_trait]
impl ConnectionEngine for WebRtcEngine {
    type LocalMedia = WebRtcLocalMedia;
    type RemoteMedia = WebRtcRemoteMedia;

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Sdp(format!("failed to create offer: {}", e)))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Sdp(format!("failed to create answer: {}", e)))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        let desc = to_rtc_description(description)?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| Error::Sdp(format!("failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        let desc = to_rtc_description(description)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| Error::Sdp(format!("failed to set remote description: {}", e)))
    }

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::Candidate(format!("failed to add remote candidate: {}", e)))
    }

    async fn attach_local_media(&self, media: &WebRtcLocalMedia) -> Result<()> {
        let mut senders = self.senders.lock().await;

        for track in [media.audio_track(), media.video_track()].into_iter().flatten() {
            let sender = self
                .pc
                .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::Engine(format!("failed to add local track: {}", e)))?;
            senders.push(sender);
        }

        debug!(stream_id = %media.id(), "local media attached");
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.pc.close().await {
            warn!("error closing peer connection: {}", e);
        }
    }
}
