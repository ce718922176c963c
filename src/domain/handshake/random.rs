use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::{RANDOM_MAX_LEN, RANDOM_MIN_LEN};
use crate::ports::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Handshake random seed (`clientRand1`, `serverRand2`, the envelope cipher
/// seed, ...).
///
/// Variable length on the wire but never shorter than 32 bytes once
/// validated. `Debug` redacts the content and the bytes are wiped on drop,
/// since the second-round seeds feed the session keys directly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct RandomSeed(#[serde(with = "serde_bytes")] Vec<u8>);

impl fmt::Debug for RandomSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomSeed({} bytes)", self.0.len())
    }
}

impl RandomSeed {
    /// Length this implementation generates.
    pub const LEN: usize = RANDOM_MIN_LEN;

    /// Draw a fresh seed of [`RandomSeed::LEN`] bytes.
    #[must_use]
    pub fn fresh(rng: &dyn RandomSource) -> Self {
        let mut v = vec![0u8; Self::LEN];
        rng.fill(&mut v);
        RandomSeed(v)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check the length bounds; `field` names the seed in the error.
    ///
    /// # Errors
    /// `HandshakeError::RandomLength` when shorter than 32 bytes or longer than
    /// the decoding bound.
    pub fn validate(&self, field: &'static str) -> Result<(), HandshakeError> {
        let actual = self.0.len();
        if !(RANDOM_MIN_LEN..=RANDOM_MAX_LEN).contains(&actual) {
            return Err(HandshakeError::RandomLength {
                field,
                min: RANDOM_MIN_LEN,
                max: RANDOM_MAX_LEN,
                actual,
            });
        }
        Ok(())
    }
}

impl From<Vec<u8>> for RandomSeed {
    fn from(v: Vec<u8>) -> Self {
        RandomSeed(v)
    }
}

impl AsRef<[u8]> for RandomSeed {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
