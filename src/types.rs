//! Core negotiation data types

use serde::{Deserialize, Serialize};

/// Which half of the offer/answer exchange a description represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    /// Proposed capabilities from the offering side
    Offer,
    /// Response from the answering side
    Answer,
}

/// A session description exchanged through the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: DescriptionKind,

    /// Raw SDP payload
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A trickled connectivity candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate string as produced by the engine
    pub candidate: String,

    /// SDP media line identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// SDP media line index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    /// Create a candidate with no media line hints
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// Local media capture constraints
///
/// Defaults to audio and video both enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Request an audio track
    pub audio: bool,

    /// Request a video track
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_constructors() {
        let offer = SessionDescription::offer("v=0");
        assert_eq!(offer.kind, DescriptionKind::Offer);
        let answer = SessionDescription::answer("v=0");
        assert_eq!(answer.kind, DescriptionKind::Answer);
    }

    #[test]
    fn test_description_serialization() {
        let desc = SessionDescription::offer("v=0\r\n");
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        let parsed: SessionDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, parsed);
    }

    #[test]
    fn test_candidate_optional_fields_skipped() {
        let candidate = IceCandidate::new("candidate:1 1 udp 2130706431 10.0.0.1 54400 typ host");
        let json = serde_json::to_string(&candidate).unwrap();
        assert!(!json.contains("sdp_mid"));
        assert!(!json.contains("sdp_mline_index"));
    }

    #[test]
    fn test_default_constraints() {
        let constraints = MediaConstraints::default();
        assert!(constraints.audio);
        assert!(constraints.video);
    }
}
