mod block;
mod rustcrypto;

pub use block::BlockEngine;
pub use rustcrypto::RustCryptoProvider;
