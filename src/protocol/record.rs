//! Record format used after the handshake (and for the `CLIENT_KEY` body).
//!
//! ```text
//! record    = u32_be(ct_len) ∥ ciphertext ∥ mac
//! plaintext = u32_be(payload_len) ∥ payload ∥ random padding
//! mac       = HMAC(mac_key, u64_be(seq) ∥ u32_be(ct_len) ∥ ciphertext)
//! ```
//!
//! Padding fills the plaintext up to the next cipher block boundary and is
//! shorter than one block.
//!
//! Channel records carry at most [`MAX_RECORD_PAYLOAD`] payload bytes. The
//! bound is fixed by the protocol, not by either side's buffer size, so peers
//! configured with different `buffer_len` values still accept each other's
//! records.

use crate::ports::RandomSource;

pub const LEN_PREFIX: usize = 4;

/// Largest payload a channel record may carry.
pub const MAX_RECORD_PAYLOAD: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record of {len} bytes exceeds the {max} byte maximum")]
    TooLarge { len: usize, max: usize },
    #[error("record length {len} is not a multiple of the cipher block ({block})")]
    Unaligned { len: usize, block: usize },
    #[error("inner length prefix out of range")]
    BadInnerLength,
    #[error("padding longer than one cipher block")]
    BadPadding,
}

/// Frame `payload` with its length and pad to a multiple of `block_len`.
///
/// # Errors
/// `TooLarge` if the payload length does not fit the `u32` prefix.
pub fn pad_inner(
    payload: &[u8],
    block_len: usize,
    padding: &dyn RandomSource,
) -> Result<Vec<u8>, RecordError> {
    let len = u32::try_from(payload.len()).map_err(|_| RecordError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    let unpadded = LEN_PREFIX + payload.len();
    let total = unpadded.div_ceil(block_len.max(1)) * block_len.max(1);
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    let mut pad = vec![0u8; total - unpadded];
    padding.fill(&mut pad);
    out.extend_from_slice(&pad);
    Ok(out)
}

/// Strip the length prefix and padding added by [`pad_inner`].
///
/// # Errors
/// `BadInnerLength` if the prefix points past the buffer, `BadPadding` if the
/// padding is a full block or more.
pub fn unpad_inner(plain: &[u8], block_len: usize) -> Result<&[u8], RecordError> {
    let (prefix, rest) = plain
        .split_first_chunk::<LEN_PREFIX>()
        .ok_or(RecordError::BadInnerLength)?;
    let len = u32::from_be_bytes(*prefix) as usize;
    if len > rest.len() {
        return Err(RecordError::BadInnerLength);
    }
    if rest.len() - len >= block_len.max(1) {
        return Err(RecordError::BadPadding);
    }
    Ok(&rest[..len])
}

/// Largest record ciphertext for a cipher with `block_len` byte blocks.
#[must_use]
pub fn max_ciphertext_len(block_len: usize) -> usize {
    MAX_RECORD_PAYLOAD + LEN_PREFIX + 2 * block_len
}
