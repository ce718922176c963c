//! Flow-control domain models.
//!
//! * `credit` – the credit value exchanged between a consumer and its producer.
//! * `port` – per-port buffering and accounting (consumer and producer sides).
//! * `abort` – categorised teardown reasons shared by every port.
//!
//! Pure data structures plus their invariants; scheduling and the wiring of
//! ports to each other live in `core::channel`.

pub mod abort;
pub mod credit;
pub mod port;

pub use abort::{AbortKind, AbortReason};
pub use credit::Credit;
pub use port::{ConsumerPort, EndOfData, FlowError, ProducerPort};
