//! CBOR helpers for handshake payloads.
//!
//! - `to_cbor` serializes any `T: Serialize` with **ciborium**.
//! - `from_cbor` decodes strictly: no trailing bytes, and the input must be
//!   exactly what `to_cbor` would produce for the decoded value.
//!
//! `from_cbor` expects the bare payload; the handshake frame header is
//! stripped by `protocol::handshake::wire` before it gets here.

use serde::{Serialize, de::DeserializeOwned};
use std::io::Cursor;

/// Errors produced by the generic codec.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// Error produced during serialization.
    #[error("CBOR serialize error: {0}")]
    Ser(#[from] ciborium::ser::Error<std::io::Error>),

    /// Error produced during deserialization.
    #[error("CBOR deserialize error: {0}")]
    De(#[from] ciborium::de::Error<std::io::Error>),

    /// The input bytes were well-formed CBOR but not in deterministic form while
    /// decoding.
    #[error("CBOR input is not in canonical/deterministic form")]
    NonCanonical,
}

/// Serialize any `T: Serialize` to CBOR bytes (deterministic under ciborium).
///
/// # Errors
///
/// Returns a [`CodecError::Ser`] if serialization fails.
pub fn to_cbor<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(256);
    ciborium::ser::into_writer(v, &mut buf)?;
    Ok(buf)
}

/// Deserialize any `T: DeserializeOwned + Serialize` from CBOR bytes.
///
/// This function always enforces strict decoding:
/// * Rejects trailing garbage after a valid item.
/// * Rejects non-canonical encodings by re-encoding deterministically and
///   requiring an exact byte-for-byte match to the input.
///
/// # Errors
///
/// * [`CodecError::De`] if deserialization fails or there are trailing bytes.
/// * [`CodecError::NonCanonical`] if the input is well‑formed but not canonical.
pub fn from_cbor<T: DeserializeOwned + Serialize>(b: &[u8]) -> Result<T, CodecError> {
    let mut cur = Cursor::new(b);
    let value: T = ciborium::de::from_reader(&mut cur)?;
    // Strict: no trailing bytes
    let pos = usize::try_from(cur.position()).map_err(|_| {
        CodecError::De(ciborium::de::Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "cursor position overflow",
        )))
    })?;
    if pos != b.len() {
        return Err(CodecError::De(ciborium::de::Error::Io(
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "trailing bytes after CBOR value",
            ),
        )));
    }
    // Canonical enforcement: deterministic re-encode must match input
    let canon = to_cbor(&value)?;
    if canon != b {
        return Err(CodecError::NonCanonical);
    }
    Ok(value)
}
