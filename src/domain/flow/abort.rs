use std::fmt;

/// Error category behind a channel abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortKind {
    /// Malformed banner, out-of-schema handshake message, unknown frame.
    Protocol,
    /// No mutually acceptable hash / cipher / MAC.
    Negotiation,
    /// MAC or digest mismatch, decrypt failure, bad RSA parameters, short seed.
    Integrity,
    /// Credentials rejected or revoked by policy.
    Authorization,
    /// Credit overrun or handshake byte limit exceeded.
    FlowControl,
    /// Local request (port abort, transport gone, misconfiguration).
    Local,
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortKind::Protocol => "protocol",
            AbortKind::Negotiation => "negotiation",
            AbortKind::Integrity => "integrity",
            AbortKind::Authorization => "authorization",
            AbortKind::FlowControl => "flow control",
            AbortKind::Local => "local",
        };
        f.write_str(s)
    }
}

/// Why a channel was torn down. Fatal by construction: nothing retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct AbortReason {
    pub kind: AbortKind,
    pub message: String,
}

impl AbortReason {
    #[must_use]
    pub fn new(kind: AbortKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn local(message: impl Into<String>) -> Self {
        Self::new(AbortKind::Local, message)
    }
}
