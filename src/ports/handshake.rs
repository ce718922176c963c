//! Handshake boundary port traits shared by the engines and the wire layer.
//!
//! The engines exchange typed [`HandshakeMessage`] values; turning them into
//! bytes (and back) is the job of a [`HandshakeWire`] so the state machines
//! never depend on a concrete serialization format.
use crate::domain::handshake::HandshakeMessage;

/// Error type for handshake wire encoding operations.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Payload did not match the message schema (arity, types, canonical form).
    #[error("codec error: {0}")]
    Codec(String),
    /// Frame type byte outside the known set.
    #[error("unknown handshake frame type: 0x{0:02x}")]
    UnknownFrame(u8),
}

/// Wire-level codec for handshake messages.
pub trait HandshakeWire {
    /// Encode `msg` as a complete frame (header included).
    ///
    /// # Errors
    /// `WireError::Codec` if encoding fails.
    fn encode(&self, msg: &HandshakeMessage) -> Result<Vec<u8>, WireError>;

    /// Decode a frame payload given its type byte.
    ///
    /// # Errors
    /// * `WireError::UnknownFrame` for an unknown type byte.
    /// * `WireError::Codec` if the payload does not match the schema.
    fn decode(&self, frame_type: u8, payload: &[u8]) -> Result<HandshakeMessage, WireError>;
}
