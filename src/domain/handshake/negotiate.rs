//! Server-side selection rule.
//!
//! For each independent choice the client's list is walked in the order the
//! client sent it and the first entry the server also allows wins. The
//! server's own ordering never matters.

use std::fmt;

use crate::domain::handshake::suite::{CipherOffer, CipherSuite};

/// The three choices fixed by `SERVER_PARAMS`. Set once per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedParameters {
    /// Handshake (PRF) hash.
    pub hash: String,
    pub suite: CipherSuite,
    /// Record MAC hash.
    pub mac: String,
}

impl fmt::Display for NegotiatedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hash={} cipher={} mac={}", self.hash, self.suite, self.mac)
    }
}

/// First client-offered name that is in `allowed`.
#[must_use]
pub fn first_match<'a>(offered: &'a [String], allowed: &[String]) -> Option<&'a str> {
    offered
        .iter()
        .find(|o| allowed.contains(o))
        .map(String::as_str)
}

/// First client-offered cipher/mode pair that is in `allowed`, walking
/// ciphers in client order and, within one cipher, modes in client order.
#[must_use]
pub fn first_suite_match(offers: &[CipherOffer], allowed: &[CipherSuite]) -> Option<CipherSuite> {
    offers.iter().find_map(|o| {
        o.modes
            .iter()
            .find(|m| {
                allowed
                    .iter()
                    .any(|a| a.cipher == o.cipher && &a.mode == *m)
            })
            .map(|m| CipherSuite::new(&o.cipher, m))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn client_order_wins() {
        let offered = names(&["a", "b", "c"]);
        assert_eq!(first_match(&offered, &names(&["b", "c"])), Some("b"));
        assert_eq!(first_match(&offered, &names(&["c", "b"])), Some("b"));
        assert_eq!(first_match(&offered, &names(&["d"])), None);
    }

    #[test]
    fn suite_walks_ciphers_then_modes() {
        let offers = vec![
            CipherOffer {
                cipher: "blowfish".into(),
                modes: names(&["ofb", "cbc"]),
            },
            CipherOffer {
                cipher: "aes256".into(),
                modes: names(&["cbc"]),
            },
        ];
        let allowed = vec![
            CipherSuite::new("aes256", "cbc"),
            CipherSuite::new("blowfish", "cbc"),
        ];
        assert_eq!(
            first_suite_match(&offers, &allowed),
            Some(CipherSuite::new("blowfish", "cbc"))
        );
        assert_eq!(first_suite_match(&offers, &[]), None);
    }

    proptest! {
        #[test]
        fn allow_list_order_is_irrelevant(
            offered in proptest::collection::vec("[a-e]", 1..6),
            allowed in proptest::collection::vec("[a-e]", 0..6),
        ) {
            let mut reversed = allowed.clone();
            reversed.reverse();
            let a = first_match(&offered, &allowed);
            prop_assert_eq!(a, first_match(&offered, &reversed));
            if let Some(pick) = a {
                let pos = offered.iter().position(|o| o == pick).unwrap();
                prop_assert!(offered[..pos].iter().all(|o| !allowed.contains(o)));
            }
        }
    }
}
