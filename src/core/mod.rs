//! Infrastructure shared by the protocol layers: canonical CBOR, the
//! handshake PRF, configuration, the local executor and the channel itself.

pub mod cbor;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod executor;
