/// ---- Wire-level bounds for handshake messages ----
/// `RANDOM_MIN_LEN` is a protocol requirement; the `*_MAX` values are
/// defensive limits that bound decoding work, not wire commitments.
pub(crate) const RANDOM_MIN_LEN: usize = 32;
pub(crate) const RANDOM_MAX_LEN: usize = 256;
pub(crate) const RESERVED_FIELDS: usize = 3;
pub(crate) const NAME_MAX: usize = 32; // algorithm / mode name length
pub(crate) const OFFER_MAX: usize = 32; // entries per offered list
pub(crate) const CERT_MAX: usize = 16 * 1024; // per certificate blob
pub(crate) const CHAIN_MAX: usize = 8; // certificates per chain
pub(crate) const IDENTITY_MAX: usize = 1024; // claimed distinguished name
pub(crate) const PAD_MAX: usize = 256;
