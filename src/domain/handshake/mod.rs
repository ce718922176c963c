/*
Handshake message definitions for VTS.

This module is the single source of truth for the wire schema of the
four-message handshake:
`CLIENT_HELLO -> SERVER_PARAMS -> CLIENT_KEY -> [SERVER_SECRET]`.

Every message is a CBOR map with a fixed field set (`deny_unknown_fields`);
optional values are still present on the wire as `null`, so each step has a
fixed arity. Semantic checks that the type system does not encode (seed
lengths, RSA parameter ranges, algorithm name syntax, certificate bounds) are
exposed as `validate()` methods returning [`HandshakeError`].

Notes:
* `CLIENT_KEY` travels as two opaque byte strings: an RSA-encrypted
  [`ClientKeyHeader`] and a block-cipher-encrypted [`ClientKeyBody`]. The
  plaintext forms are defined here; the envelope itself is built by the
  handshake engine.
* [`RandomSeed`] zeroizes on drop; the second-round seeds are secret.
* [`Credentials`] uses a hand-written deserializer that rejects maps carrying
  both (or neither) of `identity` and `cert_chain`.
*/

pub mod client_key;
pub mod credentials;
pub mod errors;
pub mod hello;
pub mod negotiate;
mod params;
pub mod public_key;
pub mod random;
pub mod server_params;
pub mod server_secret;
pub mod suite;

pub use client_key::*;
pub use credentials::*;
pub use errors::HandshakeError;
pub use hello::*;
pub use negotiate::*;
pub use public_key::*;
pub use random::*;
pub use server_params::*;
pub use server_secret::*;
pub use suite::*;

/// Any handshake message, tagged with its frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerParams(Box<ServerParams>),
    ClientKey(ClientKey),
    ServerSecret(ServerSecret),
}

impl HandshakeMessage {
    pub const CLIENT_HELLO: u8 = 1;
    pub const SERVER_PARAMS: u8 = 2;
    pub const CLIENT_KEY: u8 = 3;
    pub const SERVER_SECRET: u8 = 4;

    #[must_use]
    pub fn frame_type(&self) -> u8 {
        match self {
            HandshakeMessage::ClientHello(_) => Self::CLIENT_HELLO,
            HandshakeMessage::ServerParams(_) => Self::SERVER_PARAMS,
            HandshakeMessage::ClientKey(_) => Self::CLIENT_KEY,
            HandshakeMessage::ServerSecret(_) => Self::SERVER_SECRET,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        frame_name(self.frame_type())
    }
}

/// Human-readable message name for a frame type (used in logs and errors).
#[must_use]
pub fn frame_name(frame_type: u8) -> &'static str {
    match frame_type {
        HandshakeMessage::CLIENT_HELLO => "CLIENT_HELLO",
        HandshakeMessage::SERVER_PARAMS => "SERVER_PARAMS",
        HandshakeMessage::CLIENT_KEY => "CLIENT_KEY",
        HandshakeMessage::SERVER_SECRET => "SERVER_SECRET",
        _ => "UNKNOWN",
    }
}
