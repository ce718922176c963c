use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::{CERT_MAX, CHAIN_MAX, IDENTITY_MAX};
use crate::domain::handshake::public_key::PublicKeyDescriptor;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as DeError, MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_bytes::{ByteBuf, Bytes};
use std::fmt;

/// What a side claims to be: an opaque distinguished name, or a certificate
/// chain ordered leaf first. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Identity(Vec<u8>),
    CertChain(Vec<Vec<u8>>),
}

impl Credentials {
    /// Bounds checks on the carried blobs.
    ///
    /// # Errors
    /// `EmptyCredentials`, `ChainTooLong`, `CertTooLarge` or
    /// `IdentityTooLarge`.
    pub fn validate(&self) -> Result<(), HandshakeError> {
        match self {
            Credentials::Identity(id) => {
                if id.is_empty() {
                    return Err(HandshakeError::EmptyCredentials);
                }
                if id.len() > IDENTITY_MAX {
                    return Err(HandshakeError::IdentityTooLarge(IDENTITY_MAX));
                }
            }
            Credentials::CertChain(chain) => {
                if chain.is_empty() || chain.iter().any(Vec::is_empty) {
                    return Err(HandshakeError::EmptyCredentials);
                }
                if chain.len() > CHAIN_MAX {
                    return Err(HandshakeError::ChainTooLong(CHAIN_MAX));
                }
                if chain.iter().any(|c| c.len() > CERT_MAX) {
                    return Err(HandshakeError::CertTooLarge(CERT_MAX));
                }
            }
        }
        Ok(())
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(1))?;
        match self {
            Credentials::Identity(id) => map.serialize_entry("identity", Bytes::new(id))?,
            Credentials::CertChain(chain) => {
                let certs: Vec<&Bytes> = chain.iter().map(|c| Bytes::new(c)).collect();
                map.serialize_entry("cert_chain", &certs)?;
            }
        }
        map.end()
    }
}

// Field identifiers used during manual map deserialization.
#[derive(Debug, Clone, Copy)]
enum Field {
    Identity,
    CertChain,
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct FieldVisitor;
        impl Visitor<'_> for FieldVisitor {
            type Value = Field;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "`identity` or `cert_chain`")
            }
            fn visit_str<E: DeError>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    "identity" => Ok(Field::Identity),
                    "cert_chain" => Ok(Field::CertChain),
                    other => Err(E::unknown_field(other, &["identity", "cert_chain"])),
                }
            }
        }
        d.deserialize_identifier(FieldVisitor)
    }
}

struct CredentialsVisitor;
impl<'de> Visitor<'de> for CredentialsVisitor {
    type Value = Credentials;
    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "credentials object")
    }
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut identity: Option<ByteBuf> = None;
        let mut chain: Option<Vec<ByteBuf>> = None;
        while let Some(field) = map.next_key::<Field>()? {
            match field {
                Field::Identity => {
                    if identity.replace(map.next_value()?).is_some() {
                        return Err(A::Error::custom("duplicate identity"));
                    }
                }
                Field::CertChain => {
                    if chain.replace(map.next_value()?).is_some() {
                        return Err(A::Error::custom("duplicate cert_chain"));
                    }
                }
            }
        }
        match (identity, chain) {
            (Some(_), Some(_)) => Err(A::Error::custom(
                "credentials contain both identity and cert_chain (ambiguous)",
            )),
            (Some(id), None) => Ok(Credentials::Identity(id.into_vec())),
            (None, Some(chain)) => Ok(Credentials::CertChain(
                chain.into_iter().map(ByteBuf::into_vec).collect(),
            )),
            (None, None) => Err(A::Error::custom(
                "credentials must contain either identity or cert_chain",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_map(CredentialsVisitor)
    }
}

/// Everything learned about the peer during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCredentials {
    pub public_key: Option<PublicKeyDescriptor>,
    pub credentials: Option<Credentials>,
}

impl PeerCredentials {
    #[must_use]
    pub fn identity(&self) -> Option<&[u8]> {
        match &self.credentials {
            Some(Credentials::Identity(id)) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn cert_chain(&self) -> Option<&[Vec<u8>]> {
        match &self.credentials {
            Some(Credentials::CertChain(c)) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::{de::from_reader, ser::into_writer};

    fn to_vec<T: Serialize>(v: &T) -> Vec<u8> {
        let mut buf = Vec::new();
        into_writer(v, &mut buf).unwrap();
        buf
    }

    fn from_slice(b: &[u8]) -> Result<Credentials, ciborium::de::Error<std::io::Error>> {
        from_reader(b)
    }

    #[test]
    fn both_arms_round_trip() {
        for c in [
            Credentials::Identity(b"CN=alice".to_vec()),
            Credentials::CertChain(vec![vec![1, 2, 3], vec![4, 5]]),
        ] {
            assert_eq!(from_slice(&to_vec(&c)).unwrap(), c);
        }
    }

    #[test]
    fn rejects_both_arms() {
        #[derive(Serialize)]
        struct Both {
            #[serde(with = "serde_bytes")]
            identity: Vec<u8>,
            cert_chain: Vec<ByteBuf>,
        }
        let buf = to_vec(&Both {
            identity: b"CN=x".to_vec(),
            cert_chain: vec![ByteBuf::from(vec![1])],
        });
        let err = from_slice(&buf).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn rejects_empty_map_and_unknown_field() {
        let empty: std::collections::BTreeMap<String, u8> = std::collections::BTreeMap::new();
        assert!(from_slice(&to_vec(&empty)).is_err());
        #[derive(Serialize)]
        struct Odd {
            other: u8,
        }
        assert!(from_slice(&to_vec(&Odd { other: 1 })).is_err());
    }

    #[test]
    fn duplicate_identity_errors() {
        // Map of 2 entries, both `identity`.
        let mut base = vec![0xA2];
        for _ in 0..2 {
            base.push(0x68);
            base.extend_from_slice(b"identity");
            into_writer(&Bytes::new(b"CN=a"), &mut base).unwrap();
        }
        let err = from_slice(&base).unwrap_err();
        assert!(err.to_string().contains("duplicate identity"));
    }

    #[test]
    fn validate_bounds() {
        assert_eq!(
            Credentials::CertChain(vec![]).validate().unwrap_err(),
            HandshakeError::EmptyCredentials
        );
        assert_eq!(
            Credentials::CertChain(vec![vec![0]; CHAIN_MAX + 1])
                .validate()
                .unwrap_err(),
            HandshakeError::ChainTooLong(CHAIN_MAX)
        );
        assert_eq!(
            Credentials::Identity(vec![0; IDENTITY_MAX + 1])
                .validate()
                .unwrap_err(),
            HandshakeError::IdentityTooLarge(IDENTITY_MAX)
        );
        Credentials::Identity(b"CN=ok".to_vec()).validate().unwrap();
    }

    #[test]
    fn peer_accessors() {
        let p = PeerCredentials {
            public_key: None,
            credentials: Some(Credentials::Identity(b"CN=bob".to_vec())),
        };
        assert_eq!(p.identity(), Some(&b"CN=bob"[..]));
        assert!(p.cert_chain().is_none());
    }
}
