//! The four-port byte stream contract.
//!
//! A channel exposes two consumer ports (plaintext in, ciphertext in) and two
//! producer ports (plaintext out, ciphertext out). Code around the channel
//! (socket adapters, application sinks) implements the *other* half of each
//! pairing through these two traits and nothing else.
//!
//! Credit: every consumer tells its producer a [`Credit`], the cumulative byte
//! count the producer may have sent in total. A producer must never send past
//! it; a consumer treats doing so as a protocol violation.
use std::cell::RefCell;
use std::rc::Rc;

pub use crate::domain::flow::FlowError;
use crate::domain::flow::{AbortReason, Credit};

/// Downstream half of a pairing: accepts bytes and reports credit.
pub trait ByteConsumer {
    /// Accept `data`, returning the (possibly unchanged) credit.
    ///
    /// # Errors
    /// * `FlowError::EndOfData` if end of data was already signalled.
    /// * `FlowError::NoProducer` if nothing is attached upstream.
    /// * `FlowError::CreditExceeded` if `data` overruns the granted credit.
    /// * `FlowError::Aborted` if the consumer was torn down.
    fn consume(&mut self, data: &[u8]) -> Result<Credit, FlowError>;

    /// No more bytes follow; `clean` is false when the stream was cut short.
    fn end_of_data(&mut self, clean: bool);

    /// Unconditional teardown.
    fn abort(&mut self, reason: &AbortReason);
}

/// Upstream half of a pairing: receives credit grants.
pub trait ByteProducer {
    /// The consumer raised its credit.
    fn grant(&mut self, credit: Credit);

    /// Unconditional teardown.
    fn abort(&mut self, reason: &AbortReason);
}

/// Shared endpoints: the channel holds one clone, the owner keeps another to
/// inspect or drive it.
impl<T: ByteConsumer + ?Sized> ByteConsumer for Rc<RefCell<T>> {
    fn consume(&mut self, data: &[u8]) -> Result<Credit, FlowError> {
        self.borrow_mut().consume(data)
    }

    fn end_of_data(&mut self, clean: bool) {
        self.borrow_mut().end_of_data(clean);
    }

    fn abort(&mut self, reason: &AbortReason) {
        self.borrow_mut().abort(reason);
    }
}

impl<T: ByteProducer + ?Sized> ByteProducer for Rc<RefCell<T>> {
    fn grant(&mut self, credit: Credit) {
        self.borrow_mut().grant(credit);
    }

    fn abort(&mut self, reason: &AbortReason) {
        self.borrow_mut().abort(reason);
    }
}
