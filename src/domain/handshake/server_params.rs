use crate::domain::handshake::credentials::Credentials;
use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::public_key::PublicKeyDescriptor;
use crate::domain::handshake::random::RandomSeed;
use crate::domain::handshake::suite::{CipherSuite, validate_names};
use serde::{Deserialize, Serialize};

/// Server `SERVER_PARAMS`: the negotiated choices plus the server's key
/// material and optional credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerParams {
    pub hash: String,
    pub cipher: String,
    pub mode: String,
    pub mac: String,
    /// `serverRand1`.
    pub random: RandomSeed,
    pub public_key: PublicKeyDescriptor,
    pub credentials: Option<Credentials>,
    /// Largest RSA modulus (bits) the server accepts from the client.
    pub max_rsa_bits: Option<u32>,
    /// Handshake bytes the server is willing to receive.
    pub handshake_limit: Option<u32>,
}

impl ServerParams {
    #[must_use]
    pub fn suite(&self) -> CipherSuite {
        CipherSuite::new(&self.cipher, &self.mode)
    }

    /// Validate names, random seed, the server key (against the client's
    /// own RSA maximum) and credential bounds.
    ///
    /// # Errors
    /// Any [`HandshakeError`] from the individual checks.
    pub fn validate(&self, max_rsa_bits: usize) -> Result<(), HandshakeError> {
        for (field, name) in [
            ("hash", &self.hash),
            ("cipher", &self.cipher),
            ("mode", &self.mode),
            ("mac", &self.mac),
        ] {
            validate_names(field, std::slice::from_ref(name))?;
        }
        self.random.validate("server_random")?;
        self.public_key.validate(max_rsa_bits)?;
        if let Some(c) = &self.credentials {
            c.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cbor::{from_cbor, to_cbor};
    use crate::test_support::mk_server_params;

    #[test]
    fn fixture_round_trips() {
        let p = mk_server_params();
        p.validate(4096).unwrap();
        let back: ServerParams = from_cbor(&to_cbor(&p).unwrap()).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.suite(), CipherSuite::new("aes256", "cbc"));
    }

    #[test]
    fn oversized_key_rejected() {
        let p = mk_server_params();
        assert!(matches!(
            p.validate(256),
            Err(HandshakeError::KeyTooLarge { .. })
        ));
    }

    #[test]
    fn bad_name_and_seed_rejected() {
        let mut p = mk_server_params();
        p.mode = "CBC".into();
        assert_eq!(
            p.validate(4096).unwrap_err(),
            HandshakeError::BadAlgorithmName { field: "mode" }
        );
        let mut p = mk_server_params();
        p.random = RandomSeed::from(vec![1; 8]);
        assert!(matches!(
            p.validate(4096),
            Err(HandshakeError::RandomLength { field: "server_random", .. })
        ));
    }

    #[test]
    fn missing_optional_fields_still_need_known_keys() {
        #[derive(Serialize)]
        struct Partial {
            hash: String,
        }
        let bytes = to_cbor(&Partial { hash: "sha256".into() }).unwrap();
        assert!(from_cbor::<ServerParams>(&bytes).is_err());
    }
}
