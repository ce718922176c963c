// src/ports/crypto.rs
use crate::domain::handshake::{CipherSuite, PublicKeyDescriptor};

/// Block cipher key/IV geometry for one cipher name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherParams {
    /// Key length in bytes.
    pub key_len: usize,
    /// Block (and IV) length in bytes.
    pub block_len: usize,
}

/// Which way a [`BlockTransform`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Stateful block cipher in a chaining mode (CBC, OFB).
///
/// Consecutive calls continue the chain: the CBC chaining value / OFB keystream
/// position carries over from one `apply` to the next, so both ends must feed
/// exactly the same sequence of buffers.
pub trait BlockTransform {
    /// Cipher block length; `apply` input must be a multiple of it.
    fn block_len(&self) -> usize;

    /// Encrypt or decrypt `buf` in place.
    ///
    /// # Errors
    /// Returns `CryptoError::Unaligned` if `buf.len()` is not a multiple of
    /// [`BlockTransform::block_len`].
    fn apply(&mut self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// Source of cryptographically strong bytes (key material, seeds, padding).
///
/// Implementations must be infallible; an entropy failure is a process level
/// fault, not a protocol one.
pub trait RandomSource {
    fn fill(&self, buf: &mut [u8]);
}

/// Local RSA private key usable for the handshake key exchange.
pub trait PrivateKey {
    /// Public half as carried on the wire.
    fn public_key(&self) -> PublicKeyDescriptor;
    /// Modulus size in bits.
    fn modulus_bits(&self) -> usize;
    /// PKCS#1 v1.5 decryption of one or more modulus-sized blocks, as
    /// produced by [`CryptoProvider::rsa_encrypt`].
    ///
    /// # Errors
    /// Returns `CryptoError::RsaDecrypt` on any padding or size failure; the
    /// cause is deliberately not distinguished.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Trait for the primitive library the handshake and record layer compose.
///
/// Algorithms are addressed by their wire names (`"sha256"`, `"aes256"`,
/// `"cbc"`, ...) because those names are what the peers negotiate. A provider
/// advertises what it supports through [`CryptoProvider::hashes`] and
/// [`CryptoProvider::cipher_suites`]; every other method must fail with an
/// `Unsupported*` error for names outside those lists.
///
/// Security recommendations:
/// - Do not log keys, IVs, MAC keys or plaintext.
/// - `verify_hmac` must compare in constant time.
pub trait CryptoProvider {
    /// Supported hash names, strongest first.
    fn hashes(&self) -> Vec<String>;

    /// Supported cipher/mode pairs in preference order.
    fn cipher_suites(&self) -> Vec<CipherSuite>;

    /// Output length of `hash`.
    ///
    /// # Errors
    /// `CryptoError::UnsupportedHash` for unknown names.
    fn hash_len(&self, hash: &str) -> Result<usize, CryptoError>;

    /// One-shot digest.
    ///
    /// # Errors
    /// `CryptoError::UnsupportedHash` for unknown names.
    fn digest(&self, hash: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// One-shot HMAC.
    ///
    /// # Errors
    /// `CryptoError::UnsupportedHash` for unknown names.
    fn hmac(&self, hash: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Constant-time HMAC verification.
    ///
    /// # Errors
    /// * `CryptoError::UnsupportedHash` for unknown names.
    /// * `CryptoError::MacMismatch` if `tag` is wrong.
    fn verify_hmac(
        &self,
        hash: &str,
        key: &[u8],
        data: &[u8],
        tag: &[u8],
    ) -> Result<(), CryptoError>;

    /// Key and block geometry of `cipher`.
    ///
    /// # Errors
    /// `CryptoError::UnsupportedCipher` for unknown names.
    fn cipher_params(&self, cipher: &str) -> Result<CipherParams, CryptoError>;

    /// Build a keyed, stateful block transform.
    ///
    /// # Errors
    /// * `CryptoError::UnsupportedCipher` for unknown pairs.
    /// * `CryptoError::InvalidKeyLength` if `key`/`iv` do not match
    ///   [`CryptoProvider::cipher_params`].
    fn block_transform(
        &self,
        suite: &CipherSuite,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn BlockTransform>, CryptoError>;

    /// PKCS#1 v1.5 encryption under a peer public key. Data longer than one
    /// block can carry is split, and the modulus-sized ciphertext blocks are
    /// concatenated in order.
    ///
    /// # Errors
    /// * `CryptoError::InvalidPublicKey` if the descriptor cannot be imported.
    /// * `CryptoError::RsaEncrypt` if the modulus is too small for the padding.
    fn rsa_encrypt(
        &self,
        key: &PublicKeyDescriptor,
        data: &[u8],
        rng: &dyn RandomSource,
    ) -> Result<Vec<u8>, CryptoError>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHash(String),
    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),
    #[error("invalid key or iv length")]
    InvalidKeyLength,
    #[error("buffer length {len} is not a multiple of block length {block}")]
    Unaligned { len: usize, block: usize },
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("rsa encryption failed: {0}")]
    RsaEncrypt(String),
    #[error("rsa decryption failed")]
    RsaDecrypt,
    #[error("mac verification failed")]
    MacMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// XOR "cipher" whose state is a running byte, just enough to show chaining.
    struct ChainedXor {
        state: u8,
    }

    impl BlockTransform for ChainedXor {
        fn block_len(&self) -> usize {
            4
        }
        fn apply(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
            if buf.len() % 4 != 0 {
                return Err(CryptoError::Unaligned {
                    len: buf.len(),
                    block: 4,
                });
            }
            for b in buf.iter_mut() {
                *b ^= self.state;
                self.state = self.state.wrapping_add(1);
            }
            Ok(())
        }
    }

    #[test]
    fn chained_state_carries_across_calls() {
        let mut enc = ChainedXor { state: 7 };
        let mut dec = ChainedXor { state: 7 };
        let mut a = *b"abcd";
        let mut b = *b"efgh";
        enc.apply(&mut a).unwrap();
        enc.apply(&mut b).unwrap();
        dec.apply(&mut a).unwrap();
        dec.apply(&mut b).unwrap();
        assert_eq!(&a, b"abcd");
        assert_eq!(&b, b"efgh");
    }

    #[test]
    fn unaligned_input_rejected() {
        let mut t = ChainedXor { state: 0 };
        let err = t.apply(&mut [0u8; 3]).unwrap_err();
        assert_eq!(err, CryptoError::Unaligned { len: 3, block: 4 });
    }
}
