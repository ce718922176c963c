//! One-line protocol banner exchanged before any structured handshake.
//!
//! Both ends send `VTS-1.0\n` immediately and then read the peer's line. The
//! line is accumulated byte by byte because it may arrive split across any
//! number of transport chunks, and the bytes following the newline already
//! belong to the handshake.

/// Protocol name carried in the banner.
pub const PROTOCOL_NAME: &str = "VTS";
/// Only supported protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";
/// Default cap on the banner, newline included.
pub const DEFAULT_MAX_HELLO_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HelloError {
    #[error("hello line exceeds {max} bytes")]
    TooLong { max: usize },
    #[error("malformed hello line")]
    Malformed,
    #[error("protocol name mismatch: got {0:?}")]
    NameMismatch(String),
    #[error("unsupported protocol version: {0:?}")]
    VersionMismatch(String),
}

/// Banner this implementation sends.
#[must_use]
pub fn banner() -> Vec<u8> {
    format!("{PROTOCOL_NAME}-{PROTOCOL_VERSION}\n").into_bytes()
}

/// Parse a banner line without its trailing newline.
///
/// The line is split at the last `-` so names may themselves contain dashes.
///
/// # Errors
/// * `HelloError::Malformed` for non-UTF-8 input or a missing `-`.
/// * `HelloError::NameMismatch` / `HelloError::VersionMismatch` otherwise.
pub fn parse_banner(line: &[u8]) -> Result<(), HelloError> {
    let line = std::str::from_utf8(line).map_err(|_| HelloError::Malformed)?;
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (name, version) = line.rsplit_once('-').ok_or(HelloError::Malformed)?;
    if name != PROTOCOL_NAME {
        return Err(HelloError::NameMismatch(name.to_owned()));
    }
    if version != PROTOCOL_VERSION {
        return Err(HelloError::VersionMismatch(version.to_owned()));
    }
    Ok(())
}

/// Incremental reader for the peer banner.
#[derive(Debug)]
pub struct HelloReader {
    line: Vec<u8>,
    max_len: usize,
    done: bool,
}

impl HelloReader {
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            line: Vec::new(),
            max_len,
            done: false,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed bytes. Returns `Some(n)` once the banner was validated, where `n`
    /// is how many bytes of `data` belonged to it; the rest is handshake data.
    /// Returns `None` while the newline has not been seen yet.
    ///
    /// # Errors
    /// Any [`HelloError`]; the reader is unusable afterwards.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<usize>, HelloError> {
        if self.done {
            return Ok(Some(0));
        }
        for (i, &b) in data.iter().enumerate() {
            if self.line.len() + 1 > self.max_len {
                return Err(HelloError::TooLong { max: self.max_len });
            }
            if b == b'\n' {
                parse_banner(&self.line)?;
                self.done = true;
                self.line = Vec::new();
                return Ok(Some(i + 1));
            }
            self.line.push(b);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_banner_parses() {
        let b = banner();
        assert_eq!(b, b"VTS-1.0\n");
        parse_banner(&b[..b.len() - 1]).unwrap();
    }

    #[test]
    fn name_and_version_checked() {
        assert_eq!(
            parse_banner(b"BAD_PROTO-9.9").unwrap_err(),
            HelloError::NameMismatch("BAD_PROTO".into())
        );
        assert_eq!(
            parse_banner(b"VTS-2.0").unwrap_err(),
            HelloError::VersionMismatch("2.0".into())
        );
        assert_eq!(parse_banner(b"VTS").unwrap_err(), HelloError::Malformed);
        assert!(
            parse_banner(b"BAD_PROTO-9.9")
                .unwrap_err()
                .to_string()
                .contains("protocol name mismatch")
        );
    }

    #[test]
    fn split_at_last_dash() {
        assert_eq!(
            parse_banner(b"VTS-X-1.0").unwrap_err(),
            HelloError::NameMismatch("VTS-X".into())
        );
    }

    #[test]
    fn reader_handles_fragments_and_reports_leftover() {
        let mut r = HelloReader::new(DEFAULT_MAX_HELLO_LEN);
        assert_eq!(r.feed(b"VT").unwrap(), None);
        assert_eq!(r.feed(b"S-1.").unwrap(), None);
        assert_eq!(r.feed(b"0\nrest").unwrap(), Some(2));
        assert!(r.is_done());
    }

    #[test]
    fn reader_enforces_max_len() {
        let mut r = HelloReader::new(8);
        let err = r.feed(b"VTS-1.0000\n").unwrap_err();
        assert_eq!(err, HelloError::TooLong { max: 8 });
        let mut ok = HelloReader::new(8);
        assert_eq!(ok.feed(b"VTS-1.0\n").unwrap(), Some(8));
    }
}
