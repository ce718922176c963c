// src/adapters/crypto/block.rs
use aes::Aes256;
use blowfish::Blowfish;
use cipher::consts::U256;
use cipher::generic_array::GenericArray;
use cipher::typenum::{IsLess, Le, NonZero};
use cipher::{
    BlockCipher, BlockDecryptMut, BlockEncryptMut, BlockSizeUser, InnerIvInit, KeyInit,
    StreamCipher, StreamCipherCoreWrapper,
};

use crate::ports::crypto::{BlockTransform, CryptoError, Direction};

/// Keyed block cipher in CBC or OFB mode.
///
/// The engine owns the chaining state, so consecutive `apply` calls behave
/// like one long message: the CBC chaining value and the OFB keystream
/// position carry over.
pub enum BlockEngine {
    Aes256CbcEnc(cbc::Encryptor<Aes256>),
    Aes256CbcDec(cbc::Decryptor<Aes256>),
    Aes256Ofb(ofb::Ofb<Aes256>),
    BlowfishCbcEnc(cbc::Encryptor<Blowfish>),
    BlowfishCbcDec(cbc::Decryptor<Blowfish>),
    BlowfishOfb(ofb::Ofb<Blowfish>),
}

impl std::fmt::Debug for BlockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockEngine::Aes256CbcEnc(_) => "aes256/cbc/encrypt",
            BlockEngine::Aes256CbcDec(_) => "aes256/cbc/decrypt",
            BlockEngine::Aes256Ofb(_) => "aes256/ofb",
            BlockEngine::BlowfishCbcEnc(_) => "blowfish/cbc/encrypt",
            BlockEngine::BlowfishCbcDec(_) => "blowfish/cbc/decrypt",
            BlockEngine::BlowfishOfb(_) => "blowfish/ofb",
        };
        write!(f, "BlockEngine({name})")
    }
}

fn key_err<E>(_: E) -> CryptoError {
    CryptoError::InvalidKeyLength
}

fn init<C, M>(cipher: C, iv: &[u8]) -> Result<M, CryptoError>
where
    M: InnerIvInit<Inner = C>,
{
    M::inner_iv_slice_init(cipher, iv).map_err(key_err)
}

/// OFB only implements the IV init on its core, so the wrapper is built by hand.
fn init_ofb<C>(cipher: C, iv: &[u8]) -> Result<ofb::Ofb<C>, CryptoError>
where
    C: BlockEncryptMut + BlockCipher,
    C::BlockSize: IsLess<U256>,
    Le<C::BlockSize, U256>: NonZero,
{
    let core = ofb::OfbCore::inner_iv_slice_init(cipher, iv).map_err(key_err)?;
    Ok(StreamCipherCoreWrapper::from_core(core))
}

impl BlockEngine {
    /// Build an engine for an AES-256 or Blowfish family cipher.
    ///
    /// `family` is `"aes"` or `"blowfish"`; the key length was already checked
    /// against the cipher name by the provider.
    ///
    /// # Errors
    /// `UnsupportedCipher` for other families or modes, `InvalidKeyLength`
    /// for a bad key or IV.
    pub fn new(
        family: &str,
        mode: &str,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, CryptoError> {
        Ok(match (family, mode, direction) {
            ("aes", "cbc", Direction::Encrypt) => {
                Self::Aes256CbcEnc(init(Aes256::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            ("aes", "cbc", Direction::Decrypt) => {
                Self::Aes256CbcDec(init(Aes256::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            ("aes", "ofb", _) => {
                Self::Aes256Ofb(init_ofb(Aes256::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            ("blowfish", "cbc", Direction::Encrypt) => {
                Self::BlowfishCbcEnc(init(Blowfish::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            ("blowfish", "cbc", Direction::Decrypt) => {
                Self::BlowfishCbcDec(init(Blowfish::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            ("blowfish", "ofb", _) => {
                Self::BlowfishOfb(init_ofb(Blowfish::new_from_slice(key).map_err(key_err)?, iv)?)
            }
            _ => return Err(CryptoError::UnsupportedCipher(format!("{family}/{mode}"))),
        })
    }
}

fn cbc_encrypt<E: BlockEncryptMut>(e: &mut E, buf: &mut [u8]) {
    for chunk in buf.chunks_exact_mut(E::block_size()) {
        e.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

fn cbc_decrypt<D: BlockDecryptMut>(d: &mut D, buf: &mut [u8]) {
    for chunk in buf.chunks_exact_mut(D::block_size()) {
        d.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

impl BlockTransform for BlockEngine {
    fn block_len(&self) -> usize {
        match self {
            Self::Aes256CbcEnc(_) | Self::Aes256CbcDec(_) | Self::Aes256Ofb(_) => {
                Aes256::block_size()
            }
            Self::BlowfishCbcEnc(_) | Self::BlowfishCbcDec(_) | Self::BlowfishOfb(_) => {
                <Blowfish as BlockSizeUser>::block_size()
            }
        }
    }

    fn apply(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let block = self.block_len();
        if buf.len() % block != 0 {
            return Err(CryptoError::Unaligned {
                len: buf.len(),
                block,
            });
        }
        match self {
            Self::Aes256CbcEnc(e) => cbc_encrypt(e, buf),
            Self::Aes256CbcDec(d) => cbc_decrypt(d, buf),
            Self::Aes256Ofb(s) => s.apply_keystream(buf),
            Self::BlowfishCbcEnc(e) => cbc_encrypt(e, buf),
            Self::BlowfishCbcDec(d) => cbc_decrypt(d, buf),
            Self::BlowfishOfb(s) => s.apply_keystream(buf),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_chaining_spans_calls() {
        let key = [7u8; 32];
        let iv = [1u8; 16];
        let mut whole = [0x42u8; 64];
        let mut split = whole;
        BlockEngine::new("aes", "cbc", Direction::Encrypt, &key, &iv)
            .unwrap()
            .apply(&mut whole)
            .unwrap();
        let mut e = BlockEngine::new("aes", "cbc", Direction::Encrypt, &key, &iv).unwrap();
        let (a, b) = split.split_at_mut(16);
        e.apply(a).unwrap();
        e.apply(b).unwrap();
        assert_eq!(whole, split);
        // Identical plaintext blocks encrypt differently under CBC.
        assert_ne!(whole[..16], whole[16..32]);
    }

    #[test]
    fn ofb_is_symmetric() {
        let key = [3u8; 16];
        let iv = [9u8; 8];
        let mut buf = *b"0123456789abcdef";
        BlockEngine::new("blowfish", "ofb", Direction::Encrypt, &key, &iv)
            .unwrap()
            .apply(&mut buf)
            .unwrap();
        assert_ne!(&buf, b"0123456789abcdef");
        BlockEngine::new("blowfish", "ofb", Direction::Decrypt, &key, &iv)
            .unwrap()
            .apply(&mut buf)
            .unwrap();
        assert_eq!(&buf, b"0123456789abcdef");
    }

    #[test]
    fn bad_iv_and_family_rejected() {
        assert_eq!(
            BlockEngine::new("aes", "cbc", Direction::Encrypt, &[0; 32], &[0; 8]).unwrap_err(),
            CryptoError::InvalidKeyLength
        );
        assert!(matches!(
            BlockEngine::new("des", "cbc", Direction::Encrypt, &[0; 8], &[0; 8]),
            Err(CryptoError::UnsupportedCipher(_))
        ));
    }

    #[test]
    fn every_family_and_mode_builds() {
        let cases: [(&str, &[u8], &[u8]); 2] =
            [("aes", &[1u8; 32], &[2u8; 16]), ("blowfish", &[1u8; 16], &[2u8; 8])];
        for (family, key, iv) in cases {
            for mode in ["cbc", "ofb"] {
                let mut enc = BlockEngine::new(family, mode, Direction::Encrypt, key, iv).unwrap();
                let mut dec = BlockEngine::new(family, mode, Direction::Decrypt, key, iv).unwrap();
                let mut buf = vec![0x5Au8; 4 * enc.block_len()];
                enc.apply(&mut buf).unwrap();
                assert_ne!(buf, vec![0x5Au8; buf.len()], "{family}/{mode}");
                dec.apply(&mut buf).unwrap();
                assert_eq!(buf, vec![0x5Au8; buf.len()], "{family}/{mode}");
            }
        }
    }

    #[test]
    fn blowfish_accepts_variable_key_lengths() {
        for len in [16, 32, 56] {
            let key = vec![9u8; len];
            assert!(BlockEngine::new("blowfish", "ofb", Direction::Encrypt, &key, &[0; 8]).is_ok());
        }
    }

    #[test]
    fn unaligned_rejected() {
        let mut e = BlockEngine::new("aes", "ofb", Direction::Encrypt, &[0; 32], &[0; 16]).unwrap();
        assert_eq!(
            e.apply(&mut [0u8; 10]).unwrap_err(),
            CryptoError::Unaligned { len: 10, block: 16 }
        );
    }
}
