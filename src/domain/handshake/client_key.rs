use crate::domain::handshake::credentials::Credentials;
use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::PAD_MAX;
use crate::domain::handshake::public_key::PublicKeyDescriptor;
use crate::domain::handshake::random::RandomSeed;
use serde::{Deserialize, Serialize};

/// Client `CLIENT_KEY`: the two-part key-exchange envelope.
///
/// * `header` – [`ClientKeyHeader`] encrypted under the server's RSA key.
/// * `body` – [`ClientKeyBody`] encrypted with the envelope cipher keyed from
///   the header's `cipher_seed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientKey {
    #[serde(with = "serde_bytes")]
    pub header: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

/// RSA-protected part of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientKeyHeader {
    /// `clientRand2`.
    pub random: RandomSeed,
    /// Seed for the envelope cipher key.
    pub cipher_seed: RandomSeed,
    /// Handshake-hash digest of the encoded body plaintext.
    #[serde(with = "serde_bytes")]
    pub digest: Vec<u8>,
}

impl ClientKeyHeader {
    /// # Errors
    /// `RandomLength` when either seed is too short.
    pub fn validate(&self) -> Result<(), HandshakeError> {
        self.random.validate("client_random2")?;
        self.cipher_seed.validate("cipher_seed")
    }
}

/// Block-cipher-protected part of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientKeyBody {
    /// Present when the client owns a keypair; the server then answers with
    /// `SERVER_SECRET`.
    pub public_key: Option<PublicKeyDescriptor>,
    pub credentials: Option<Credentials>,
    /// Reserved random padding.
    #[serde(with = "serde_bytes")]
    pub pad: Vec<u8>,
}

impl ClientKeyBody {
    /// # Errors
    /// Key, credential or padding bound violations.
    pub fn validate(&self, max_rsa_bits: usize) -> Result<(), HandshakeError> {
        if let Some(k) = &self.public_key {
            k.validate(max_rsa_bits)?;
        }
        if let Some(c) = &self.credentials {
            c.validate()?;
        }
        if self.pad.len() > PAD_MAX {
            return Err(HandshakeError::PadTooLarge("CLIENT_KEY body"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cbor::{from_cbor, to_cbor};

    #[test]
    fn body_pad_bound() {
        let mut b = ClientKeyBody {
            public_key: None,
            credentials: Some(Credentials::Identity(b"CN=c".to_vec())),
            pad: vec![0; PAD_MAX],
        };
        b.validate(4096).unwrap();
        b.pad.push(0);
        assert_eq!(
            b.validate(4096).unwrap_err(),
            HandshakeError::PadTooLarge("CLIENT_KEY body")
        );
    }

    #[test]
    fn header_round_trips_and_validates() {
        let h = ClientKeyHeader {
            random: RandomSeed::from(vec![1; 32]),
            cipher_seed: RandomSeed::from(vec![2; 32]),
            digest: vec![3; 64],
        };
        h.validate().unwrap();
        let back: ClientKeyHeader = from_cbor(&to_cbor(&h).unwrap()).unwrap();
        assert_eq!(back, h);
        let short = ClientKeyHeader {
            cipher_seed: RandomSeed::from(vec![2; 4]),
            ..h
        };
        assert!(matches!(
            short.validate(),
            Err(HandshakeError::RandomLength { field: "cipher_seed", .. })
        ));
    }
}
