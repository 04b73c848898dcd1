//! Relay message contract and channel capability

pub mod protocol;
pub mod relay;

pub use protocol::{InboundEvent, OutboundMessage, SessionAck};
pub use relay::RelayChannel;
