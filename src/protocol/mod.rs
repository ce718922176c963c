//! Byte-level protocol pieces: handshake framing, key schedule and the
//! record format used once the channel is open.

pub mod handshake;
pub mod record;
