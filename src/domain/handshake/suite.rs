use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::{NAME_MAX, OFFER_MAX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiated cipher plus chaining mode, e.g. `aes256` / `cbc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CipherSuite {
    pub cipher: String,
    pub mode: String,
}

impl CipherSuite {
    #[must_use]
    pub fn new(cipher: &str, mode: &str) -> Self {
        Self {
            cipher: cipher.to_owned(),
            mode: mode.to_owned(),
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cipher, self.mode)
    }
}

/// One entry of the client's cipher offer: a cipher and the modes it accepts
/// for it, both in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CipherOffer {
    pub cipher: String,
    pub modes: Vec<String>,
}

impl CipherOffer {
    /// Group an ordered suite list into per-cipher offers, keeping first-seen
    /// cipher order and mode order.
    #[must_use]
    pub fn group(suites: &[CipherSuite]) -> Vec<CipherOffer> {
        let mut out: Vec<CipherOffer> = Vec::new();
        for s in suites {
            match out.iter_mut().find(|o| o.cipher == s.cipher) {
                Some(o) => {
                    if !o.modes.contains(&s.mode) {
                        o.modes.push(s.mode.clone());
                    }
                }
                None => out.push(CipherOffer {
                    cipher: s.cipher.clone(),
                    modes: vec![s.mode.clone()],
                }),
            }
        }
        out
    }

    /// Whether `suite` appears in this offer list.
    #[must_use]
    pub fn offered(offers: &[CipherOffer], suite: &CipherSuite) -> bool {
        offers
            .iter()
            .any(|o| o.cipher == suite.cipher && o.modes.contains(&suite.mode))
    }
}

/// Algorithm names are short lowercase ASCII tokens (`sha256`, `blowfish128`).
pub(crate) fn is_algorithm_name(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= NAME_MAX
        && s
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'))
}

/// Validate an offered name list.
pub(crate) fn validate_names(field: &'static str, names: &[String]) -> Result<(), HandshakeError> {
    if names.is_empty() {
        return Err(HandshakeError::EmptyOffer(field));
    }
    if names.len() > OFFER_MAX {
        return Err(HandshakeError::OfferTooLarge(field));
    }
    if !names.iter().all(|n| is_algorithm_name(n)) {
        return Err(HandshakeError::BadAlgorithmName { field });
    }
    Ok(())
}
