use thiserror::Error;

use crate::application::credentials::CredentialError;
use crate::core::cbor::CodecError;
use crate::core::config::ConfigError;
use crate::domain::flow::AbortKind;
use crate::domain::handshake::HandshakeError;
use crate::ports::crypto::CryptoError;
use crate::ports::handshake::WireError;
use crate::protocol::handshake::wire::FrameError;
use crate::protocol::record::RecordError;

use super::fsm_types::HandshakeState;

/// Failures while driving the handshake. Each one is fatal for the channel;
/// [`EngineError::abort_kind`] says how the abort is classified.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Message(#[from] HandshakeError),

    #[error("malformed handshake message: {0}")]
    Wire(#[from] WireError),

    #[error("malformed handshake payload: {0}")]
    Payload(#[from] CodecError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("unexpected {message} in state {state:?}")]
    Unexpected {
        message: &'static str,
        state: HandshakeState,
    },

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("no mutually acceptable {0}")]
    NoCommonAlgorithm(&'static str),

    #[error("invalid negotiated {0} from server")]
    InvalidNegotiated(&'static str),

    #[error("local key of {bits} bits exceeds the peer's {max}-bit limit")]
    PeerKeyLimit { bits: usize, max: usize },

    #[error("handshake message of {len} bytes exceeds the peer's remaining limit of {remaining}")]
    PeerByteLimit { len: usize, remaining: usize },

    #[error("{0}")]
    Integrity(&'static str),

    #[error("envelope: {0}")]
    Envelope(#[from] RecordError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    #[must_use]
    pub fn abort_kind(&self) -> AbortKind {
        match self {
            EngineError::Message(e) => e.abort_kind(),
            EngineError::Wire(_)
            | EngineError::Payload(_)
            | EngineError::Unexpected { .. }
            | EngineError::Duplicate(_) => AbortKind::Protocol,
            EngineError::Frame(_) | EngineError::PeerByteLimit { .. } => AbortKind::FlowControl,
            EngineError::NoCommonAlgorithm(_)
            | EngineError::InvalidNegotiated(_)
            | EngineError::PeerKeyLimit { .. } => AbortKind::Negotiation,
            EngineError::Integrity(_) | EngineError::Envelope(_) => AbortKind::Integrity,
            EngineError::Crypto(e) => match e {
                CryptoError::RsaDecrypt
                | CryptoError::MacMismatch
                | CryptoError::InvalidPublicKey(_)
                | CryptoError::Unaligned { .. } => AbortKind::Integrity,
                _ => AbortKind::Local,
            },
            EngineError::Credentials(_) => AbortKind::Authorization,
            EngineError::Config(_) => AbortKind::Local,
        }
    }
}
