use std::fmt;

/// Cumulative byte allowance a consumer grants its producer.
///
/// `Limited(n)` means the producer may have sent at most `n` bytes *in total*
/// since the pairing began; `Unbounded` lifts the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credit {
    Limited(u64),
    Unbounded,
}

impl Credit {
    /// Nothing may be sent yet.
    pub const NONE: Credit = Credit::Limited(0);

    /// Whether a cumulative total of `total` bytes stays inside this credit.
    #[must_use]
    pub fn allows(self, total: u64) -> bool {
        match self {
            Credit::Limited(n) => total <= n,
            Credit::Unbounded => true,
        }
    }

    /// Bytes still sendable after `sent` cumulative bytes; `None` when unbounded.
    #[must_use]
    pub fn remaining(self, sent: u64) -> Option<u64> {
        match self {
            Credit::Limited(n) => Some(n.saturating_sub(sent)),
            Credit::Unbounded => None,
        }
    }

    /// Whether `self` grants strictly more than `other`.
    #[must_use]
    pub fn exceeds(self, other: Credit) -> bool {
        match (self, other) {
            (Credit::Unbounded, Credit::Limited(_)) => true,
            (Credit::Limited(a), Credit::Limited(b)) => a > b,
            (_, Credit::Unbounded) => false,
        }
    }
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credit::Limited(n) => write!(f, "{n}"),
            Credit::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_and_remaining() {
        let c = Credit::Limited(10);
        assert!(c.allows(10));
        assert!(!c.allows(11));
        assert_eq!(c.remaining(4), Some(6));
        assert_eq!(c.remaining(12), Some(0));
        assert_eq!(Credit::Unbounded.remaining(u64::MAX), None);
    }

    #[test]
    fn exceeds_orders_unbounded_highest() {
        assert!(Credit::Unbounded.exceeds(Credit::Limited(u64::MAX)));
        assert!(Credit::Limited(5).exceeds(Credit::Limited(4)));
        assert!(!Credit::Limited(4).exceeds(Credit::Limited(4)));
        assert!(!Credit::Limited(4).exceeds(Credit::Unbounded));
    }

    #[test]
    fn display() {
        assert_eq!(Credit::Limited(42).to_string(), "42");
        assert_eq!(Credit::Unbounded.to_string(), "unbounded");
    }
}
