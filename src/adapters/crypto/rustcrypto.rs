// src/adapters/crypto/rustcrypto.rs
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use rand_core::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::block::BlockEngine;
use crate::domain::handshake::{CipherSuite, PublicKeyDescriptor, RSA_ALG};
use crate::ports::crypto::{
    BlockTransform, CipherParams, CryptoError, CryptoProvider, Direction, RandomSource,
};

/// Largest peer modulus `rsa` is asked to import. Negotiated limits are
/// enforced before this; it only bounds the bignum work.
const RSA_IMPORT_MAX_BITS: usize = 16384;
/// PKCS#1 v1.5 padding bytes per RSA block.
const PKCS1_OVERHEAD: usize = 11;

const HASHES: [&str; 4] = ["sha512", "sha384", "sha256", "sha1"];
const CIPHERS: [&str; 3] = ["aes256", "blowfish", "blowfish128"];
const MODES: [&str; 2] = ["cbc", "ofb"];

/// [`CryptoProvider`] backed by the RustCrypto crates and `rsa`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn mac_with<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<M, CryptoError> {
    let mut m =
        <M as KeyInit>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
    m.update(data);
    Ok(m)
}

/// Adapts a [`RandomSource`] to the `rand_core` traits `rsa` wants.
struct RngAdapter<'a>(&'a dyn RandomSource);

impl RngCore for RngAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.0.fill(&mut b);
        u32::from_le_bytes(b)
    }

    fn next_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        self.0.fill(&mut b);
        u64::from_le_bytes(b)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.fill(dest);
        Ok(())
    }
}

impl CryptoRng for RngAdapter<'_> {}

impl CryptoProvider for RustCryptoProvider {
    fn hashes(&self) -> Vec<String> {
        HASHES.iter().map(|h| (*h).to_string()).collect()
    }

    fn cipher_suites(&self) -> Vec<CipherSuite> {
        CIPHERS
            .iter()
            .flat_map(|c| MODES.iter().map(move |m| CipherSuite::new(c, m)))
            .collect()
    }

    fn hash_len(&self, hash: &str) -> Result<usize, CryptoError> {
        match hash {
            "sha512" => Ok(64),
            "sha384" => Ok(48),
            "sha256" => Ok(32),
            "sha1" => Ok(20),
            other => Err(CryptoError::UnsupportedHash(other.to_string())),
        }
    }

    fn digest(&self, hash: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(match hash {
            "sha512" => Sha512::digest(data).to_vec(),
            "sha384" => Sha384::digest(data).to_vec(),
            "sha256" => Sha256::digest(data).to_vec(),
            "sha1" => Sha1::digest(data).to_vec(),
            other => return Err(CryptoError::UnsupportedHash(other.to_string())),
        })
    }

    fn hmac(&self, hash: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(match hash {
            "sha512" => mac_with::<Hmac<Sha512>>(key, data)?.finalize().into_bytes().to_vec(),
            "sha384" => mac_with::<Hmac<Sha384>>(key, data)?.finalize().into_bytes().to_vec(),
            "sha256" => mac_with::<Hmac<Sha256>>(key, data)?.finalize().into_bytes().to_vec(),
            "sha1" => mac_with::<Hmac<Sha1>>(key, data)?.finalize().into_bytes().to_vec(),
            other => return Err(CryptoError::UnsupportedHash(other.to_string())),
        })
    }

    fn verify_hmac(
        &self,
        hash: &str,
        key: &[u8],
        data: &[u8],
        tag: &[u8],
    ) -> Result<(), CryptoError> {
        let ok = match hash {
            "sha512" => mac_with::<Hmac<Sha512>>(key, data)?.verify_slice(tag).is_ok(),
            "sha384" => mac_with::<Hmac<Sha384>>(key, data)?.verify_slice(tag).is_ok(),
            "sha256" => mac_with::<Hmac<Sha256>>(key, data)?.verify_slice(tag).is_ok(),
            "sha1" => mac_with::<Hmac<Sha1>>(key, data)?.verify_slice(tag).is_ok(),
            other => return Err(CryptoError::UnsupportedHash(other.to_string())),
        };
        if ok {
            Ok(())
        } else {
            Err(CryptoError::MacMismatch)
        }
    }

    fn cipher_params(&self, cipher: &str) -> Result<CipherParams, CryptoError> {
        match cipher {
            "aes256" => Ok(CipherParams {
                key_len: 32,
                block_len: 16,
            }),
            "blowfish" => Ok(CipherParams {
                key_len: 56,
                block_len: 8,
            }),
            "blowfish128" => Ok(CipherParams {
                key_len: 16,
                block_len: 8,
            }),
            other => Err(CryptoError::UnsupportedCipher(other.to_string())),
        }
    }

    fn block_transform(
        &self,
        suite: &CipherSuite,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn BlockTransform>, CryptoError> {
        let params = self.cipher_params(&suite.cipher)?;
        if key.len() != params.key_len || iv.len() != params.block_len {
            return Err(CryptoError::InvalidKeyLength);
        }
        let family = if suite.cipher == "aes256" { "aes" } else { "blowfish" };
        if !MODES.contains(&suite.mode.as_str()) {
            return Err(CryptoError::UnsupportedCipher(suite.to_string()));
        }
        Ok(Box::new(BlockEngine::new(
            family,
            &suite.mode,
            direction,
            key,
            iv,
        )?))
    }

    fn rsa_encrypt(
        &self,
        key: &PublicKeyDescriptor,
        data: &[u8],
        rng: &dyn RandomSource,
    ) -> Result<Vec<u8>, CryptoError> {
        if key.alg != RSA_ALG {
            return Err(CryptoError::InvalidPublicKey(format!(
                "unsupported key algorithm {:?}",
                key.alg
            )));
        }
        let (Some(n), Some(e)) = (key.modulus_magnitude(), key.exponent_magnitude()) else {
            return Err(CryptoError::InvalidPublicKey("negative parameter".into()));
        };
        let n = BigUint::from_bytes_be(n);
        let e = BigUint::from_bytes_be(e);
        let public = RsaPublicKey::new_with_max_size(n, e, RSA_IMPORT_MAX_BITS)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        let block = public.size();
        let room = block.saturating_sub(PKCS1_OVERHEAD);
        if room == 0 {
            return Err(CryptoError::RsaEncrypt(format!(
                "a {block}-byte modulus cannot carry PKCS#1 v1.5 padding"
            )));
        }
        let mut rng = RngAdapter(rng);
        let mut out = Vec::with_capacity(data.len().div_ceil(room).max(1) * block);
        // Empty input still produces one block.
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(room).collect()
        };
        for chunk in chunks {
            let sealed = public
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
                .map_err(|e| CryptoError::RsaEncrypt(e.to_string()))?;
            out.extend_from_slice(&sealed);
        }
        Ok(out)
    }
}
