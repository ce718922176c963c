//! Pure protocol types. Nothing in here performs I/O or cryptography.

pub mod flow;
pub mod handshake;
pub mod hello;
