pub mod credentials;
pub mod handshake;
