//! Concrete implementations of the boundary ports.
//!
//! * `crypto` – RustCrypto hashes, HMAC and block ciphers plus RSA PKCS#1 v1.5
//!   encryption.
//! * `rsa_key` – local RSA keypair.
//! * `random` – OS-backed random source.
//! * `x509` – certificate checks through `x509-parser`.

pub mod crypto;
pub mod random;
pub mod rsa_key;
pub mod x509;
