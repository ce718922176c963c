use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::OFFER_MAX;
use crate::domain::handshake::random::RandomSeed;
use crate::domain::handshake::suite::{CipherOffer, validate_names};
use serde::{Deserialize, Serialize};

/// Client `CLIENT_HELLO`: the negotiation proposal.
///
/// Lists are in client preference order; the server picks the first entry of
/// each list it also allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientHello {
    /// Acceptable handshake (PRF) hashes.
    pub hashes: Vec<String>,
    /// Acceptable ciphers, each with its acceptable modes.
    pub ciphers: Vec<CipherOffer>,
    /// Acceptable MAC hashes.
    pub macs: Vec<String>,
    /// `clientRand1`.
    pub random: RandomSeed,
    /// Largest RSA modulus (bits) the client accepts from the server.
    pub max_rsa_bits: Option<u32>,
    /// Handshake bytes the client is willing to receive.
    pub handshake_limit: Option<u32>,
}

impl ClientHello {
    /// Validate offer syntax and the random seed.
    ///
    /// # Errors
    /// Returns `Err` when an offer list is empty, too long or holds an invalid
    /// name, or when `random` is shorter than 32 bytes.
    pub fn validate(&self) -> Result<(), HandshakeError> {
        validate_names("hashes", &self.hashes)?;
        validate_names("macs", &self.macs)?;
        if self.ciphers.is_empty() {
            return Err(HandshakeError::EmptyOffer("ciphers"));
        }
        if self.ciphers.len() > OFFER_MAX {
            return Err(HandshakeError::OfferTooLarge("ciphers"));
        }
        for offer in &self.ciphers {
            validate_names("ciphers", std::slice::from_ref(&offer.cipher))?;
            validate_names("modes", &offer.modes)?;
        }
        self.random.validate("client_random")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cbor::{from_cbor, to_cbor};
    use crate::test_support::mk_client_hello;

    #[test]
    fn fixture_is_valid_and_round_trips() {
        let h = mk_client_hello();
        h.validate().unwrap();
        let back: ClientHello = from_cbor(&to_cbor(&h).unwrap()).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn empty_lists_rejected() {
        let mut h = mk_client_hello();
        h.ciphers.clear();
        assert_eq!(h.validate().unwrap_err(), HandshakeError::EmptyOffer("ciphers"));
        let mut h = mk_client_hello();
        h.ciphers[0].modes.clear();
        assert_eq!(h.validate().unwrap_err(), HandshakeError::EmptyOffer("modes"));
        let mut h = mk_client_hello();
        h.macs.clear();
        assert_eq!(h.validate().unwrap_err(), HandshakeError::EmptyOffer("macs"));
    }

    #[test]
    fn short_random_rejected() {
        let mut h = mk_client_hello();
        h.random = RandomSeed::from(vec![7u8; 16]);
        assert!(matches!(
            h.validate(),
            Err(HandshakeError::RandomLength { actual: 16, .. })
        ));
    }

    #[derive(Serialize)]
    struct HelloExtra {
        #[serde(flatten)]
        base: ClientHello,
        xtra: u8,
    }

    #[test]
    fn deny_unknown_fields_rejected() {
        let bytes = to_cbor(&HelloExtra {
            base: mk_client_hello(),
            xtra: 1,
        })
        .unwrap();
        assert!(from_cbor::<ClientHello>(&bytes).is_err());
    }
}
