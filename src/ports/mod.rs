pub mod authorization;
pub mod certificate;
pub mod crypto;
pub mod handshake;
pub mod scheduler;
pub mod stream;

pub use authorization::*;
pub use certificate::*;
pub use crypto::*;
pub use handshake::*;
pub use scheduler::*;
pub use stream::*;
