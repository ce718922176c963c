mod client;
pub mod errors;
pub mod fsm_machine;
pub mod fsm_types;
mod server;

pub use errors::*;
pub use fsm_machine::HandshakeFsm;
pub use fsm_types::*;
