//! Crate root for `vts`.
//!
//! VTS turns an ordered, asynchronous byte transport into an authenticated,
//! encrypted byte channel. A channel end-point exchanges a one-line banner,
//! runs an RSA based handshake (algorithm negotiation, key exchange,
//! credential authorization, session-key derivation) and then pumps bytes
//! between a plaintext side and a ciphertext side under credit based
//! backpressure.
//!
//! High-level tree:
//! * `ports` – boundary traits (crypto provider, random source, the four-port
//!   byte stream contract, scheduler, authorization policy, certificate
//!   verifier, handshake wire codec).
//! * `domain` – pure types & invariants (banner, handshake messages,
//!   credentials, negotiation rule, credit accounting).
//! * `protocol::handshake` – key schedule and handshake wire framing.
//! * `application` – handshake engines and the credential validator.
//! * `core` – CBOR codec, PRF, configuration, executor and the channel itself.
//! * `adapters` – RustCrypto / `rsa` / `x509-parser` backed implementations.
//!
//! Typical wiring:
//! ```ignore
//! let exec = LocalExecutor::new();
//! let client = Channel::new(Role::Client, client_config, exec.scheduler())?;
//! let server = Channel::new(Role::Server, server_config, exec.scheduler())?;
//! vts::core::channel::connect(&client.ciphertext_out(), &server.ciphertext_in());
//! vts::core::channel::connect(&server.ciphertext_out(), &client.ciphertext_in());
//! exec.run_until_idle();
//! ```
pub mod adapters;
pub mod application;
pub mod core;
pub mod domain;
pub mod ports;
pub mod protocol;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::application::handshake::Role;
pub use crate::core::channel::{
    AbortKind, AbortReason, Channel, ChannelState, ConsumerHandle, ProducerHandle, connect,
};
pub use crate::core::config::{ChannelConfig, ChannelSettings, LocalCredentials};
pub use crate::core::executor::LocalExecutor;
pub use crate::domain::flow::Credit;
pub use crate::ports::stream::{ByteConsumer, ByteProducer, FlowError};
