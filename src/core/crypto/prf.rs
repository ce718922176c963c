/*
    HMAC based byte generator used by the VTS key schedule.

    TLS-style P_hash (RFC 5246 §5) over whichever hash the peers negotiated:

        A(0) = label
        A(i) = HMAC(secret, A(i-1))
        out  = HMAC(secret, A(1) || label) || HMAC(secret, A(2) || label) || ...

    The generator is stateful: successive draws continue the same output
    stream, so two ends derive matching material only if they draw the same
    lengths in the same order.
*/

use crate::ports::crypto::{CryptoError, CryptoProvider};
use zeroize::Zeroizing;

/// Sequential P_hash stream.
pub struct Prf<'a> {
    provider: &'a dyn CryptoProvider,
    hash: String,
    secret: Zeroizing<Vec<u8>>,
    label: Vec<u8>,
    a: Zeroizing<Vec<u8>>,
    block: Zeroizing<Vec<u8>>,
    pos: usize,
}

impl std::fmt::Debug for Prf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prf").field("hash", &self.hash).finish_non_exhaustive()
    }
}

impl<'a> Prf<'a> {
    /// Start a stream keyed by `secret` with domain-separation `label`.
    ///
    /// # Errors
    /// `CryptoError::UnsupportedHash` if the provider does not know `hash`.
    pub fn new(
        provider: &'a dyn CryptoProvider,
        hash: &str,
        secret: &[u8],
        label: &[u8],
    ) -> Result<Self, CryptoError> {
        provider.hash_len(hash)?;
        Ok(Self {
            provider,
            hash: hash.to_owned(),
            secret: Zeroizing::new(secret.to_vec()),
            label: label.to_vec(),
            a: Zeroizing::new(label.to_vec()),
            block: Zeroizing::new(Vec::new()),
            pos: 0,
        })
    }

    /// Fill `out` with the next bytes of the stream.
    ///
    /// # Errors
    /// Propagates provider HMAC failures.
    pub fn fill(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let mut written = 0;
        while written < out.len() {
            if self.pos == self.block.len() {
                self.next_block()?;
            }
            let take = (self.block.len() - self.pos).min(out.len() - written);
            out[written..written + take].copy_from_slice(&self.block[self.pos..self.pos + take]);
            self.pos += take;
            written += take;
        }
        Ok(())
    }

    /// Draw `len` bytes as an owned, zeroizing buffer.
    ///
    /// # Errors
    /// Propagates provider HMAC failures.
    pub fn draw(&mut self, len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let mut out = Zeroizing::new(vec![0u8; len]);
        self.fill(&mut out)?;
        Ok(out)
    }

    fn next_block(&mut self) -> Result<(), CryptoError> {
        let a = self.provider.hmac(&self.hash, &self.secret, &self.a)?;
        self.a = Zeroizing::new(a);
        let mut input = Zeroizing::new(Vec::with_capacity(self.a.len() + self.label.len()));
        input.extend_from_slice(&self.a);
        input.extend_from_slice(&self.label);
        self.block = Zeroizing::new(self.provider.hmac(&self.hash, &self.secret, &input)?);
        self.pos = 0;
        Ok(())
    }
}
