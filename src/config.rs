//! Configuration types for the negotiation engine

use crate::types::MediaConstraints;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bounded negotiation timeout in seconds
pub const DEFAULT_NEGOTIATION_TIMEOUT_SECS: u64 = 30;

/// Main configuration for a negotiation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Local media capture constraints (default: audio + video)
    pub media: MediaConstraints,

    /// Bounded negotiation timeout in seconds; `None` disables the watchdog
    pub negotiation_timeout_secs: Option<u64>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            media: MediaConstraints::default(),
            negotiation_timeout_secs: Some(DEFAULT_NEGOTIATION_TIMEOUT_SECS),
        }
    }
}

impl NegotiationConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.stun_servers.is_empty() && self.turn_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one STUN or TURN server is required".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "invalid STUN server URL: {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "invalid TURN server URL: {}",
                    turn.url
                )));
            }
            if turn.username.is_empty() || turn.credential.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "TURN server {} requires username and credential",
                    turn.url
                )));
            }
        }

        if !self.media.audio && !self.media.video {
            return Err(Error::InvalidConfig(
                "media constraints must enable audio or video".to_string(),
            ));
        }

        if self.negotiation_timeout_secs == Some(0) {
            return Err(Error::InvalidConfig(
                "negotiation_timeout_secs must be positive; use None to disable".to_string(),
            ));
        }

        Ok(())
    }

    /// Negotiation watchdog duration, if enabled
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        self.negotiation_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NegotiationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.negotiation_timeout(),
            Some(Duration::from_secs(DEFAULT_NEGOTIATION_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_requires_ice_servers() {
        let config = NegotiationConfig {
            stun_servers: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_stun_url() {
        let config = NegotiationConfig {
            stun_servers: vec!["http://example.com".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_turn_requires_credentials() {
        let config = NegotiationConfig {
            turn_servers: vec![TurnServerConfig {
                url: "turn:turn.example.com:3478".to_string(),
                username: String::new(),
                credential: String::new(),
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = NegotiationConfig {
            negotiation_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NegotiationConfig {
            negotiation_timeout_secs: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.negotiation_timeout(), None);
    }

    #[test]
    fn test_rejects_empty_media() {
        let config = NegotiationConfig {
            media: MediaConstraints {
                audio: false,
                video: false,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
