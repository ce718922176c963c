// src/adapters/rsa_key.rs
use rand_core::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use crate::domain::handshake::PublicKeyDescriptor;
use crate::ports::crypto::{CryptoError, PrivateKey};

/// Local RSA keypair for the key exchange.
///
/// The private key is zeroized on drop by `rsa` itself.
#[derive(Clone)]
pub struct RsaKeyPair {
    inner: RsaPrivateKey,
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsaKeyPair({} bits)", self.modulus_bits())
    }
}

impl RsaKeyPair {
    /// Generate a fresh keypair from the OS CSPRNG.
    ///
    /// # Errors
    /// `CryptoError::InvalidPublicKey` if `rsa` rejects the size.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a PKCS#1 DER `RSAPrivateKey`.
    ///
    /// # Errors
    /// `CryptoError::InvalidPublicKey` if the DER is not a usable key.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::from_private_key(inner))
    }

    #[must_use]
    pub fn from_private_key(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }
}

impl PrivateKey for RsaKeyPair {
    fn public_key(&self) -> PublicKeyDescriptor {
        PublicKeyDescriptor::rsa(&self.inner.n().to_bytes_be(), &self.inner.e().to_bytes_be())
    }

    fn modulus_bits(&self) -> usize {
        self.inner.size() * 8
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let block = self.inner.size();
        if ciphertext.is_empty() || ciphertext.len() % block != 0 {
            return Err(CryptoError::RsaDecrypt);
        }
        let mut plain = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext.chunks(block) {
            let part = self
                .inner
                .decrypt(Pkcs1v15Encrypt, chunk)
                .map_err(|_| CryptoError::RsaDecrypt)?;
            plain.extend_from_slice(&part);
        }
        Ok(plain)
    }
}
