//! Pluggable peer authorization policy consulted by the credential validator
//! and, lazily, by the channel before delivering decrypted plaintext.
use crate::domain::handshake::PeerCredentials;

/// Authorization decisions over a peer's validated credentials.
///
/// Every hook has a permissive default so `struct AcceptAll; impl
/// AuthorizationPolicy for AcceptAll {}` is a complete policy.
pub trait AuthorizationPolicy {
    /// Reject peers that present no certificate chain.
    fn require_certificate(&self) -> bool {
        false
    }

    /// When `Some`, the root (last element) of the peer chain must be
    /// byte-identical to one of these DER certificates.
    fn trusted_roots(&self) -> Option<&[Vec<u8>]> {
        None
    }

    /// Final accept/reject decision over the full credential tuple.
    ///
    /// # Errors
    /// Returns a human readable rejection reason.
    fn authorize(&self, peer: &PeerCredentials) -> Result<(), String> {
        let _ = peer;
        Ok(())
    }

    /// Re-evaluated before each plaintext delivery; returning `false` revokes a
    /// previously granted authorization and aborts the channel.
    fn still_authorized(&self, peer: &PeerCredentials) -> bool {
        let _ = peer;
        true
    }
}
