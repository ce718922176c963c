use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::random::RandomSeed;
use serde::{Deserialize, Serialize};

/// Server `SERVER_SECRET`, sent only when the client presented a public key.
/// `payload` is a [`ServerSecretPayload`] encrypted under that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSecret {
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSecretPayload {
    /// `serverRand2`.
    pub random: RandomSeed,
}

impl ServerSecretPayload {
    /// # Errors
    /// `RandomLength` when the seed is too short.
    pub fn validate(&self) -> Result<(), HandshakeError> {
        self.random.validate("server_random2")
    }
}
