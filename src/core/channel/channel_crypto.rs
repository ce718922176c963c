//! Record protection for one direction of an open channel.
//!
//! The sealer and opener each own a chained block transform, so records of a
//! direction must be opened in exactly the order they were sealed. The MAC
//! covers the record sequence number, which makes a dropped, replayed or
//! reordered record fail verification.

use std::fmt;
use std::rc::Rc;

use bytes::{Buf, BytesMut};
use zeroize::Zeroizing;

use crate::domain::flow::AbortKind;
use crate::domain::handshake::NegotiatedParameters;
use crate::ports::crypto::{BlockTransform, CryptoError, CryptoProvider, Direction, RandomSource};
use crate::protocol::handshake::keyschedule::DirectionKeys;
use crate::protocol::record::{
    LEN_PREFIX, MAX_RECORD_PAYLOAD, RecordError, max_ciphertext_len, pad_inner, unpad_inner,
};

/// Errors surfaced while sealing or opening records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelCryptoError {
    #[error("record protection failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("malformed record: {0}")]
    Record(#[from] RecordError),
    #[error("record sequence space exhausted")]
    SequenceExhausted,
}

impl ChannelCryptoError {
    /// Category the channel aborts with.
    #[must_use]
    pub fn abort_kind(&self) -> AbortKind {
        match self {
            ChannelCryptoError::Record(_)
            | ChannelCryptoError::Crypto(CryptoError::MacMismatch | CryptoError::Unaligned { .. }) => {
                AbortKind::Integrity
            }
            ChannelCryptoError::Crypto(_) | ChannelCryptoError::SequenceExhausted => {
                AbortKind::Local
            }
        }
    }
}

/// `u64_be(seq) ∥ u32_be(ct_len) ∥ ciphertext`
fn mac_input(seq: u64, ciphertext: &[u8]) -> Result<Vec<u8>, RecordError> {
    let len = u32::try_from(ciphertext.len()).map_err(|_| RecordError::TooLarge {
        len: ciphertext.len(),
        max: u32::MAX as usize,
    })?;
    let mut m = Vec::with_capacity(8 + LEN_PREFIX + ciphertext.len());
    m.extend_from_slice(&seq.to_be_bytes());
    m.extend_from_slice(&len.to_be_bytes());
    m.extend_from_slice(ciphertext);
    Ok(m)
}

/// Keyed MAC state shared by both record directions.
struct RecordMac {
    crypto: Rc<dyn CryptoProvider>,
    hash: String,
    key: Zeroizing<Vec<u8>>,
}

/// Outbound record protection.
pub struct RecordSealer {
    transform: Box<dyn BlockTransform>,
    mac: RecordMac,
    padding: Rc<dyn RandomSource>,
    seq: u64,
}

impl fmt::Debug for RecordSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSealer")
            .field("mac", &self.mac.hash)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl RecordSealer {
    /// # Errors
    /// `ChannelCryptoError::Crypto` if the provider rejects the negotiated
    /// suite or the key lengths.
    pub fn new(
        crypto: Rc<dyn CryptoProvider>,
        padding: Rc<dyn RandomSource>,
        params: &NegotiatedParameters,
        keys: &DirectionKeys,
    ) -> Result<Self, ChannelCryptoError> {
        let transform =
            crypto.block_transform(&params.suite, Direction::Encrypt, &keys.key, &keys.iv)?;
        Ok(Self {
            transform,
            mac: RecordMac {
                crypto,
                hash: params.mac.clone(),
                key: Zeroizing::new(keys.mac_key.clone()),
            },
            padding,
            seq: 0,
        })
    }

    /// Records sealed so far.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Encrypt and authenticate `payload` as one record.
    ///
    /// # Errors
    /// `TooLarge` for a payload over [`MAX_RECORD_PAYLOAD`], provider
    /// failures, or `SequenceExhausted` after 2^64 records.
    pub fn seal(&mut self, payload: &[u8]) -> Result<Vec<u8>, ChannelCryptoError> {
        if payload.len() > MAX_RECORD_PAYLOAD {
            return Err(RecordError::TooLarge {
                len: payload.len(),
                max: MAX_RECORD_PAYLOAD,
            }
            .into());
        }
        let next = self
            .seq
            .checked_add(1)
            .ok_or(ChannelCryptoError::SequenceExhausted)?;
        let mut ct = pad_inner(payload, self.transform.block_len(), self.padding.as_ref())?;
        self.transform.apply(&mut ct)?;
        let tag = self
            .mac
            .crypto
            .hmac(&self.mac.hash, &self.mac.key, &mac_input(self.seq, &ct)?)?;
        self.seq = next;

        let mut record = Vec::with_capacity(LEN_PREFIX + ct.len() + tag.len());
        record.extend_from_slice(&len_prefix(&ct)?);
        record.extend_from_slice(&ct);
        record.extend_from_slice(&tag);
        Ok(record)
    }
}

fn len_prefix(ct: &[u8]) -> Result<[u8; LEN_PREFIX], RecordError> {
    u32::try_from(ct.len())
        .map(u32::to_be_bytes)
        .map_err(|_| RecordError::TooLarge {
            len: ct.len(),
            max: u32::MAX as usize,
        })
}

/// Inbound record protection. Bytes are pushed as they arrive and complete
/// records are pulled out one at a time.
pub struct RecordOpener {
    transform: Box<dyn BlockTransform>,
    mac: RecordMac,
    mac_len: usize,
    max_len: usize,
    pending: BytesMut,
    seq: u64,
}

impl fmt::Debug for RecordOpener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordOpener")
            .field("mac", &self.mac.hash)
            .field("seq", &self.seq)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl RecordOpener {
    /// # Errors
    /// `ChannelCryptoError::Crypto` if the provider rejects the negotiated
    /// suite, the key lengths or the MAC hash.
    pub fn new(
        crypto: Rc<dyn CryptoProvider>,
        params: &NegotiatedParameters,
        keys: &DirectionKeys,
    ) -> Result<Self, ChannelCryptoError> {
        let transform =
            crypto.block_transform(&params.suite, Direction::Decrypt, &keys.key, &keys.iv)?;
        let mac_len = crypto.hash_len(&params.mac)?;
        let max_len = max_ciphertext_len(transform.block_len());
        Ok(Self {
            transform,
            mac: RecordMac {
                crypto,
                hash: params.mac.clone(),
                key: Zeroizing::new(keys.mac_key.clone()),
            },
            mac_len,
            max_len,
            pending: BytesMut::new(),
            seq: 0,
        })
    }

    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Bytes of an incomplete record are waiting.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Verify, decrypt and unpad the next complete record.
    ///
    /// The length prefix is checked as soon as it is readable, so an
    /// oversized record fails before its body arrives.
    ///
    /// # Errors
    /// `TooLarge` / `Unaligned` for a bad length prefix, `MacMismatch` for a
    /// forged, replayed or reordered record, padding errors after decryption.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>, ChannelCryptoError> {
        let Some(prefix) = self.pending.first_chunk::<LEN_PREFIX>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes(*prefix) as usize;
        if len > self.max_len {
            return Err(RecordError::TooLarge {
                len,
                max: self.max_len,
            }
            .into());
        }
        let block = self.transform.block_len();
        if len == 0 || len % block != 0 {
            return Err(RecordError::Unaligned { len, block }.into());
        }
        if self.pending.len() < LEN_PREFIX + len + self.mac_len {
            return Ok(None);
        }
        self.pending.advance(LEN_PREFIX);
        let mut ct = self.pending.split_to(len);
        let tag = self.pending.split_to(self.mac_len);

        self.mac
            .crypto
            .verify_hmac(&self.mac.hash, &self.mac.key, &mac_input(self.seq, &ct)?, &tag)?;
        self.seq = self
            .seq
            .checked_add(1)
            .ok_or(ChannelCryptoError::SequenceExhausted)?;

        self.transform.apply(&mut ct)?;
        Ok(Some(unpad_inner(&ct, block)?.to_vec()))
    }
}
