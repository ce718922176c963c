use crate::domain::flow::AbortKind;
use thiserror::Error;

/// Semantic validation failures discovered after a handshake message was
/// decoded (or before one is sent).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// A random seed was shorter than the protocol minimum or absurdly long.
    #[error("{field} must be between {min} and {max} bytes, got {actual}")]
    RandomLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },
    /// An offered list was empty.
    #[error("{0} offer must not be empty")]
    EmptyOffer(&'static str),
    /// An offered list had too many entries.
    #[error("{0} offer has too many entries")]
    OfferTooLarge(&'static str),
    /// Algorithm / mode names are lowercase ASCII tokens.
    #[error("{field} contains an invalid algorithm name")]
    BadAlgorithmName { field: &'static str },

    // PUBLIC KEY
    #[error("unsupported public key algorithm {0:?}")]
    UnsupportedKeyAlgorithm(String),
    #[error("public key reserved fields must be null")]
    ReservedNotNull,
    #[error("invalid rsa public key: {0}")]
    InvalidPublicKey(&'static str),
    #[error("rsa modulus of {bits} bits exceeds the {max} bit maximum")]
    KeyTooLarge { bits: usize, max: usize },

    // CREDENTIALS
    #[error("credentials must not be empty")]
    EmptyCredentials,
    #[error("certificate chain has more than {0} certificates")]
    ChainTooLong(usize),
    #[error("certificate exceeds {0} bytes")]
    CertTooLarge(usize),
    #[error("identity exceeds {0} bytes")]
    IdentityTooLarge(usize),

    #[error("{0} padding too large")]
    PadTooLarge(&'static str),

    /// Generic exact-length mismatch.
    #[error("{field} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl HandshakeError {
    /// How the channel classifies this failure when it aborts.
    #[must_use]
    pub fn abort_kind(&self) -> AbortKind {
        match self {
            HandshakeError::RandomLength { .. }
            | HandshakeError::UnsupportedKeyAlgorithm(_)
            | HandshakeError::ReservedNotNull
            | HandshakeError::InvalidPublicKey(_)
            | HandshakeError::KeyTooLarge { .. }
            | HandshakeError::LengthMismatch { .. } => AbortKind::Integrity,
            HandshakeError::EmptyOffer(_)
            | HandshakeError::OfferTooLarge(_)
            | HandshakeError::BadAlgorithmName { .. }
            | HandshakeError::EmptyCredentials
            | HandshakeError::ChainTooLong(_)
            | HandshakeError::CertTooLarge(_)
            | HandshakeError::IdentityTooLarge(_)
            | HandshakeError::PadTooLarge(_) => AbortKind::Protocol,
        }
    }
}
