//! Handshake frame preamble and incremental decoder.
//!
//! ```text
//! frame = u32_be(payload_len) ∥ u8(frame_type) ∥ payload
//! ```
//!
//! Every byte of a received frame (header included) counts toward the local
//! handshake byte limit. Bytes that follow the last frame stay buffered and
//! are handed back with [`FrameDecoder::take_remaining`] once the handshake
//! is over.

use bytes::{Buf, Bytes, BytesMut};

pub const FRAME_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("handshake byte limit exceeded: {attempted} > {limit}")]
    LimitExceeded { limit: usize, attempted: usize },
    #[error("handshake frame too large for the length prefix")]
    Oversized,
}

/// Prepend the frame header.
///
/// # Errors
/// `FrameError::Oversized` if `payload` does not fit a `u32` length.
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::Oversized)?;
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.push(frame_type);
    out.extend_from_slice(payload);
    Ok(out)
}

#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    received: usize,
    limit: usize,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            received: 0,
            limit,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Handshake bytes accounted so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Pop the next complete frame as `(frame_type, payload)`.
    ///
    /// # Errors
    /// `FrameError::LimitExceeded` as soon as a header announces a frame that
    /// would take the total past the limit, before its payload arrives.
    pub fn next_frame(&mut self) -> Result<Option<(u8, Bytes)>, FrameError> {
        let Some(header) = self.buf.first_chunk::<FRAME_HEADER_LEN>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let frame_type = header[4];
        let attempted = self
            .received
            .saturating_add(FRAME_HEADER_LEN)
            .saturating_add(len);
        if attempted > self.limit {
            return Err(FrameError::LimitExceeded {
                limit: self.limit,
                attempted,
            });
        }
        if self.buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }
        self.buf.advance(FRAME_HEADER_LEN);
        let payload = self.buf.split_to(len).freeze();
        self.received = attempted;
        Ok(Some((frame_type, payload)))
    }

    /// Bytes buffered beyond the frames returned so far.
    pub fn take_remaining(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let f = encode_frame(2, b"abc").unwrap();
        assert_eq!(f, vec![0, 0, 0, 3, 2, b'a', b'b', b'c']);
    }

    #[test]
    fn decodes_split_frames_and_keeps_tail() {
        let mut d = FrameDecoder::new(1024);
        let mut wire = encode_frame(1, b"hello").unwrap();
        wire.extend(encode_frame(3, b"").unwrap());
        wire.extend_from_slice(b"record-bytes");
        d.push(&wire[..3]);
        assert_eq!(d.next_frame().unwrap(), None);
        d.push(&wire[3..]);
        assert_eq!(d.next_frame().unwrap(), Some((1, Bytes::from_static(b"hello"))));
        assert_eq!(d.next_frame().unwrap(), Some((3, Bytes::new())));
        assert_eq!(d.received(), 15);
        assert_eq!(&d.take_remaining()[..], b"record-bytes");
    }

    #[test]
    fn limit_checked_from_header_alone() {
        let mut d = FrameDecoder::new(16);
        d.push(&[0, 0, 0, 100, 1]);
        assert_eq!(
            d.next_frame().unwrap_err(),
            FrameError::LimitExceeded {
                limit: 16,
                attempted: 105
            }
        );
    }
}
