//! Peer credential validation.
//!
//! Runs once per handshake, as soon as the peer's key and credentials are
//! known. Chain checks come first (validity window of every certificate, then
//! each certificate against the key of the next one, then the leaf against the
//! peer's handshake key), then the policy hooks in a fixed order: certificate
//! requirement, trusted root, final decision.
//! Nothing here retries; any error aborts the channel.

use std::fmt;
use std::time::SystemTime;

use crate::domain::handshake::PeerCredentials;
use crate::ports::authorization::AuthorizationPolicy;
use crate::ports::certificate::{CertificateError, CertificateVerifier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("peer certificate {index} rejected: {source}")]
    Certificate {
        index: usize,
        #[source]
        source: CertificateError,
    },
    #[error("peer certificate {index} is not signed by its issuer: {source}")]
    BrokenChain {
        index: usize,
        #[source]
        source: CertificateError,
    },
    #[error("peer leaf certificate is not issued for its handshake key")]
    KeyMismatch,
    #[error("peer leaf certificate could not be read: {0}")]
    LeafKey(#[source] CertificateError),
    #[error("peer presented no certificate chain")]
    CertificateRequired,
    #[error("peer certificate chain is not signed by a trusted root")]
    UntrustedRoot,
    #[error("peer rejected by policy: {0}")]
    Rejected(String),
}

/// Validate `peer` against `policy` at time `now`.
///
/// # Errors
/// The first failing check, as a [`CredentialError`].
pub fn validate_credentials(
    peer: &PeerCredentials,
    policy: &dyn AuthorizationPolicy,
    verifier: &dyn CertificateVerifier,
    now: SystemTime,
) -> Result<(), CredentialError> {
    if let Some(chain) = peer.cert_chain() {
        for (index, der) in chain.iter().enumerate() {
            verifier
                .check_validity(der, now)
                .map_err(|source| CredentialError::Certificate { index, source })?;
        }
        for (index, pair) in chain.windows(2).enumerate() {
            verifier
                .verify_issued_by(&pair[0], &pair[1])
                .map_err(|source| CredentialError::BrokenChain { index, source })?;
        }
        // A chain only speaks for a peer that proved possession of its leaf key.
        if let (Some(leaf), Some(key)) = (chain.first(), peer.public_key.as_ref())
            && !verifier
                .subject_key_matches(leaf, key)
                .map_err(CredentialError::LeafKey)?
        {
            return Err(CredentialError::KeyMismatch);
        }
    }

    if policy.require_certificate() && peer.cert_chain().is_none() {
        return Err(CredentialError::CertificateRequired);
    }

    if let Some(roots) = policy.trusted_roots() {
        let root = peer
            .cert_chain()
            .and_then(<[Vec<u8>]>::last)
            .ok_or(CredentialError::UntrustedRoot)?;
        if !roots.iter().any(|r| r == root) {
            return Err(CredentialError::UntrustedRoot);
        }
    }

    policy.authorize(peer).map_err(CredentialError::Rejected)
}

/// Policy that accepts every peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AuthorizationPolicy for AcceptAll {}

type Decision = Box<dyn Fn(&PeerCredentials) -> Result<(), String>>;
type Recheck = Box<dyn Fn(&PeerCredentials) -> bool>;

/// Configurable [`AuthorizationPolicy`].
///
/// ```ignore
/// let policy = PeerPolicy::new()
///     .require_certificate()
///     .trusted_roots(vec![root_der])
///     .authorize_with(|peer| match peer.identity() {
///         Some(b"CN=ops") => Ok(()),
///         _ => Err("unknown identity".into()),
///     });
/// ```
#[derive(Default)]
pub struct PeerPolicy {
    require_certificate: bool,
    trusted_roots: Option<Vec<Vec<u8>>>,
    decision: Option<Decision>,
    recheck: Option<Recheck>,
}

impl fmt::Debug for PeerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPolicy")
            .field("require_certificate", &self.require_certificate)
            .field(
                "trusted_roots",
                &self.trusted_roots.as_ref().map(Vec::len),
            )
            .field("decision", &self.decision.is_some())
            .field("recheck", &self.recheck.is_some())
            .finish()
    }
}

impl PeerPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require_certificate(mut self) -> Self {
        self.require_certificate = true;
        self
    }

    /// Only accept chains whose root is byte-identical to one of `roots`.
    #[must_use]
    pub fn trusted_roots(mut self, roots: Vec<Vec<u8>>) -> Self {
        self.trusted_roots = Some(roots);
        self
    }

    #[must_use]
    pub fn authorize_with(
        mut self,
        f: impl Fn(&PeerCredentials) -> Result<(), String> + 'static,
    ) -> Self {
        self.decision = Some(Box::new(f));
        self
    }

    /// Hook consulted before every plaintext delivery.
    #[must_use]
    pub fn recheck_with(mut self, f: impl Fn(&PeerCredentials) -> bool + 'static) -> Self {
        self.recheck = Some(Box::new(f));
        self
    }
}

impl AuthorizationPolicy for PeerPolicy {
    fn require_certificate(&self) -> bool {
        self.require_certificate
    }

    fn trusted_roots(&self) -> Option<&[Vec<u8>]> {
        self.trusted_roots.as_deref()
    }

    fn authorize(&self, peer: &PeerCredentials) -> Result<(), String> {
        match &self.decision {
            Some(f) => f(peer),
            None => Ok(()),
        }
    }

    fn still_authorized(&self, peer: &PeerCredentials) -> bool {
        self.recheck.as_ref().is_none_or(|f| f(peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::x509::X509Verifier;
    use crate::domain::handshake::Credentials;
    use crate::ports::crypto::PrivateKey;
    use crate::test_support::{cert_chain, other_cert_chain, peer_keypair, test_keypair};
    use std::time::{Duration, UNIX_EPOCH};

    fn with_chain(chain: Vec<Vec<u8>>) -> PeerCredentials {
        PeerCredentials {
            public_key: None,
            credentials: Some(Credentials::CertChain(chain)),
        }
    }

    fn with_identity(id: &[u8]) -> PeerCredentials {
        PeerCredentials {
            public_key: None,
            credentials: Some(Credentials::Identity(id.to_vec())),
        }
    }

    fn check(peer: &PeerCredentials, policy: &dyn AuthorizationPolicy) -> Result<(), CredentialError> {
        validate_credentials(peer, policy, &X509Verifier, SystemTime::now())
    }

    #[test]
    fn valid_chain_accepted_by_default() {
        check(&with_chain(cert_chain().to_vec()), &AcceptAll).unwrap();
        check(&PeerCredentials::default(), &AcceptAll).unwrap();
    }

    #[test]
    fn broken_link_reports_index() {
        let c = cert_chain();
        let peer = with_chain(vec![c.leaf, c.root]);
        assert!(matches!(
            check(&peer, &AcceptAll),
            Err(CredentialError::BrokenChain { index: 0, .. })
        ));
    }

    #[test]
    fn expired_certificate_rejected() {
        let peer = with_chain(cert_chain().to_vec());
        let err = validate_credentials(
            &peer,
            &AcceptAll,
            &X509Verifier,
            UNIX_EPOCH + Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CredentialError::Certificate {
                index: 0,
                source: CertificateError::NotValidAt
            }
        );
    }

    #[test]
    fn leaf_must_be_issued_for_the_handshake_key() {
        let mut peer = with_chain(cert_chain().to_vec());
        peer.public_key = Some(test_keypair().public_key());
        check(&peer, &AcceptAll).unwrap();

        peer.public_key = Some(peer_keypair().public_key());
        let err = check(&peer, &AcceptAll).unwrap_err();
        assert_eq!(err, CredentialError::KeyMismatch);
        assert!(err.to_string().contains("handshake key"));
    }

    #[test]
    fn certificate_requirement() {
        let policy = PeerPolicy::new().require_certificate();
        assert_eq!(
            check(&with_identity(b"CN=x"), &policy).unwrap_err(),
            CredentialError::CertificateRequired
        );
        check(&with_chain(cert_chain().to_vec()), &policy).unwrap();
    }

    #[test]
    fn untrusted_root_rejected() {
        let policy = PeerPolicy::new().trusted_roots(vec![cert_chain().root]);
        check(&with_chain(cert_chain().to_vec()), &policy).unwrap();
        let err = check(&with_chain(other_cert_chain().to_vec()), &policy).unwrap_err();
        assert_eq!(err, CredentialError::UntrustedRoot);
        assert!(err.to_string().contains("not signed by a trusted root"));
        // No chain at all cannot be rooted anywhere.
        assert_eq!(
            check(&with_identity(b"CN=x"), &policy).unwrap_err(),
            CredentialError::UntrustedRoot
        );
    }

    #[test]
    fn decision_sees_identity() {
        let policy = PeerPolicy::new().authorize_with(|p| match p.identity() {
            Some(b"CN=ops") => Ok(()),
            _ => Err("unknown identity".into()),
        });
        check(&with_identity(b"CN=ops"), &policy).unwrap();
        assert_eq!(
            check(&with_identity(b"CN=eve"), &policy).unwrap_err(),
            CredentialError::Rejected("unknown identity".into())
        );
    }

    #[test]
    fn recheck_defaults_to_true() {
        let peer = with_identity(b"CN=ops");
        assert!(PeerPolicy::new().still_authorized(&peer));
        assert!(!PeerPolicy::new().recheck_with(|_| false).still_authorized(&peer));
    }
}
