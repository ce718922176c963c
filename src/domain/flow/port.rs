//! Buffering and accounting for one end of a port pair.
//!
//! A [`ConsumerPort`] receives bytes from an upstream producer and hands out
//! credit; a [`ProducerPort`] holds bytes for a downstream consumer and only
//! releases them inside the credit that consumer granted. Counters are
//! cumulative for the lifetime of the pairing, so credit is an absolute byte
//! position rather than a window delta. Attaching a new peer starts a new
//! pairing: the counter and the credit go back to zero, buffered bytes stay.

use bytes::{Bytes, BytesMut};

use super::credit::Credit;

/// Reasons a port refuses an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("end of data already signalled")]
    EndOfData,
    #[error("no producer attached")]
    NoProducer,
    #[error("credit exceeded: limit {limit}, attempted {attempted}")]
    CreditExceeded { limit: Credit, attempted: u64 },
    #[error("channel aborted")]
    Aborted,
}

/// End-of-data bookkeeping for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndOfData {
    /// The upstream side asked to end the stream.
    pub requested: bool,
    /// Whether it ended cleanly (as opposed to truncation by the transport).
    pub clean: bool,
    /// The signal has been forwarded downstream.
    pub acknowledged: bool,
}

impl EndOfData {
    pub fn request(&mut self, clean: bool) {
        if !self.requested {
            self.requested = true;
            self.clean = clean;
        }
    }

    /// Requested but not yet forwarded.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.requested && !self.acknowledged
    }
}

/// Receiving side of a port pair.
#[derive(Debug)]
pub struct ConsumerPort {
    buffer: BytesMut,
    capacity: usize,
    consumed: u64,
    limit: Credit,
    eof: EndOfData,
    producer_attached: bool,
}

impl ConsumerPort {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            consumed: 0,
            limit: Credit::NONE,
            eof: EndOfData::default(),
            producer_attached: false,
        }
    }

    /// Pair with a new producer, whose credit counts from zero.
    pub fn attach(&mut self) {
        self.producer_attached = true;
        self.consumed = 0;
        self.limit = Credit::NONE;
    }

    pub fn detach(&mut self) {
        self.producer_attached = false;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.producer_attached
    }

    /// Buffer `data` from the upstream producer.
    ///
    /// # Errors
    /// * `FlowError::EndOfData` after end of data was requested.
    /// * `FlowError::NoProducer` when nothing is attached.
    /// * `FlowError::CreditExceeded` when the cumulative total would pass the
    ///   granted credit; nothing is buffered in that case.
    pub fn accept(&mut self, data: &[u8]) -> Result<(), FlowError> {
        if self.eof.requested {
            return Err(FlowError::EndOfData);
        }
        if !self.producer_attached {
            return Err(FlowError::NoProducer);
        }
        let attempted = self.consumed.saturating_add(data.len() as u64);
        if !self.limit.allows(attempted) {
            return Err(FlowError::CreditExceeded {
                limit: self.limit,
                attempted,
            });
        }
        self.buffer.extend_from_slice(data);
        self.consumed = attempted;
        Ok(())
    }

    /// Credit the buffer could honour right now: everything already consumed
    /// plus the free space.
    #[must_use]
    pub fn available_credit(&self) -> Credit {
        let free = self.capacity.saturating_sub(self.buffer.len()) as u64;
        Credit::Limited(self.consumed.saturating_add(free))
    }

    /// Raise the granted credit. Credit never shrinks; returns `true` when the
    /// value changed and the producer should be told.
    pub fn raise_credit(&mut self, to: Credit) -> bool {
        if to.exceeds(self.limit) {
            self.limit = to;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn credit(&self) -> Credit {
        self.limit
    }

    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop up to `max` buffered bytes in arrival order.
    pub fn take(&mut self, max: usize) -> Bytes {
        let n = max.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Pop everything buffered.
    pub fn take_all(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn end_of_data(&mut self) -> &mut EndOfData {
        &mut self.eof
    }

    #[must_use]
    pub fn eof(&self) -> EndOfData {
        self.eof
    }

    /// Drop buffered bytes and release the allocation.
    pub fn clear(&mut self) {
        self.buffer = BytesMut::new();
    }
}

/// Sending side of a port pair.
#[derive(Debug)]
pub struct ProducerPort {
    buffer: BytesMut,
    produced: u64,
    limit: Credit,
    eof: EndOfData,
    consumer_attached: bool,
}

impl Default for ProducerPort {
    fn default() -> Self {
        Self::new()
    }
}

impl ProducerPort {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            produced: 0,
            limit: Credit::NONE,
            eof: EndOfData::default(),
            consumer_attached: false,
        }
    }

    /// Pair with a new consumer. Nothing is sendable until it grants credit
    /// counted from zero.
    pub fn attach(&mut self) {
        self.consumer_attached = true;
        self.produced = 0;
        self.limit = Credit::NONE;
    }

    /// Detaching forgets the old consumer's credit.
    pub fn detach(&mut self) {
        self.consumer_attached = false;
        self.limit = Credit::NONE;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.consumer_attached
    }

    /// Queue bytes for the downstream consumer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Record a credit grant. Lower values than already granted are ignored.
    pub fn grant(&mut self, credit: Credit) {
        if credit.exceeds(self.limit) {
            self.limit = credit;
        }
    }

    #[must_use]
    pub fn credit(&self) -> Credit {
        self.limit
    }

    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes that may be handed downstream right now.
    #[must_use]
    pub fn sendable(&self) -> usize {
        if !self.consumer_attached {
            return 0;
        }
        match self.limit.remaining(self.produced) {
            None => self.buffer.len(),
            Some(r) => usize::try_from(r).unwrap_or(usize::MAX).min(self.buffer.len()),
        }
    }

    /// Pop the sendable prefix and count it as produced.
    pub fn take_sendable(&mut self) -> Bytes {
        let n = self.sendable();
        self.produced += n as u64;
        self.buffer.split_to(n).freeze()
    }

    pub fn end_of_data(&mut self) -> &mut EndOfData {
        &mut self.eof
    }

    #[must_use]
    pub fn eof(&self) -> EndOfData {
        self.eof
    }

    /// End of data may be forwarded once everything queued went out.
    #[must_use]
    pub fn drained(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer = BytesMut::new();
    }
}
