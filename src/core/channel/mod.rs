//! One VTS channel end-point.
//!
//! A [`Channel`] exposes four port handles. Bytes written into
//! [`Channel::plaintext_in`] leave encrypted through
//! [`Channel::ciphertext_out`]; bytes written into [`Channel::ciphertext_in`]
//! leave decrypted through [`Channel::plaintext_out`]. Until the handshake
//! finishes only the banner and handshake frames travel on the ciphertext
//! side and no plaintext credit is granted.
//!
//! All work runs as tasks on the [`Scheduler`] handed to [`Channel::new`]:
//! inbound calls on a handle only buffer and queue a step. Endpoint calls are
//! made with no channel state borrowed, so an endpoint may call straight back
//! into the channel.

pub mod channel_crypto;
pub mod runtime;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::application::handshake::Role;
use crate::core::config::{ChannelConfig, ConfigError};
use crate::domain::flow::{Credit, FlowError};
use crate::domain::handshake::{NegotiatedParameters, PeerCredentials};
use crate::ports::scheduler::Scheduler;
use crate::ports::stream::{ByteConsumer, ByteProducer};
use crate::protocol::handshake::keyschedule::SessionKeys;

pub use crate::domain::flow::{AbortKind, AbortReason};
pub use channel_crypto::{ChannelCryptoError, RecordOpener, RecordSealer};
pub use runtime::{ChannelState, Side};

use runtime::{Action, Runtime};

/// External endpoints currently attached to the four ports.
#[derive(Default)]
struct Endpoints {
    pt_producer: Option<Box<dyn ByteProducer>>,
    ct_producer: Option<Box<dyn ByteProducer>>,
    pt_consumer: Option<Box<dyn ByteConsumer>>,
    ct_consumer: Option<Box<dyn ByteConsumer>>,
}

impl Endpoints {
    fn producer(&mut self, side: Side) -> &mut Option<Box<dyn ByteProducer>> {
        match side {
            Side::Plaintext => &mut self.pt_producer,
            Side::Ciphertext => &mut self.ct_producer,
        }
    }

    fn consumer(&mut self, side: Side) -> &mut Option<Box<dyn ByteConsumer>> {
        match side {
            Side::Plaintext => &mut self.pt_consumer,
            Side::Ciphertext => &mut self.ct_consumer,
        }
    }
}

struct Shared {
    runtime: RefCell<Runtime>,
    endpoints: RefCell<Endpoints>,
    scheduler: Rc<dyn Scheduler>,
}

fn flow_abort_kind(err: &FlowError) -> AbortKind {
    match err {
        FlowError::CreditExceeded { .. } => AbortKind::FlowControl,
        FlowError::EndOfData => AbortKind::Protocol,
        FlowError::NoProducer | FlowError::Aborted => AbortKind::Local,
    }
}

impl Shared {
    /// Queue one step unless one is already waiting.
    fn schedule(this: &Rc<Self>) {
        {
            let mut rt = this.runtime.borrow_mut();
            if rt.step_queued || rt.state().is_terminal() {
                return;
            }
            rt.step_queued = true;
        }
        let weak = Rc::downgrade(this);
        this.scheduler.submit(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::step(&shared);
            }
        }));
    }

    fn schedule_abort(this: &Rc<Self>, reason: AbortReason) {
        let weak = Rc::downgrade(this);
        this.scheduler.submit(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::abort(&shared, reason);
            }
        }));
    }

    /// Advance until nothing moves, performing endpoint calls in between.
    fn step(this: &Rc<Self>) {
        this.runtime.borrow_mut().step_queued = false;
        loop {
            let advanced = this.runtime.borrow_mut().advance();
            let actions = match advanced {
                Ok(actions) => actions,
                Err(reason) => {
                    Shared::abort(this, reason);
                    return;
                }
            };
            if actions.is_empty() {
                break;
            }
            for action in actions {
                Shared::perform(this, action);
            }
        }
        if this.runtime.borrow().state() == ChannelState::Closed {
            // Nothing is delivered after close.
            *this.endpoints.borrow_mut() = Endpoints::default();
        }
    }

    fn perform(this: &Rc<Self>, action: Action) {
        if this.runtime.borrow().state() == ChannelState::Aborted {
            return;
        }
        match action {
            Action::Deliver(side, bytes) => {
                let taken = this.endpoints.borrow_mut().consumer(side).take();
                let Some(mut consumer) = taken else {
                    Shared::abort(this, AbortReason::local(format!("{side} consumer detached")));
                    return;
                };
                let result = consumer.consume(&bytes);
                Shared::restore_consumer(this, side, consumer);
                match result {
                    Ok(credit) => this.runtime.borrow_mut().producer(side).grant(credit),
                    Err(e) => Shared::abort(
                        this,
                        AbortReason::new(
                            flow_abort_kind(&e),
                            format!("{side} consumer refused data: {e}"),
                        ),
                    ),
                }
            }
            Action::Grant(side, credit) => {
                let taken = this.endpoints.borrow_mut().producer(side).take();
                if let Some(mut producer) = taken {
                    producer.grant(credit);
                    Shared::restore_producer(this, side, producer);
                }
            }
            Action::EndOfData(side, clean) => {
                let taken = this.endpoints.borrow_mut().consumer(side).take();
                if let Some(mut consumer) = taken {
                    debug!(%side, clean, "end of data forwarded");
                    consumer.end_of_data(clean);
                    Shared::restore_consumer(this, side, consumer);
                }
            }
        }
    }

    /// Put an endpoint back after a call. If the channel aborted during the
    /// call the cascade missed it, so it is aborted here instead.
    fn restore_consumer(this: &Rc<Self>, side: Side, mut consumer: Box<dyn ByteConsumer>) {
        let reason = this.runtime.borrow().abort_reason().cloned();
        match reason {
            Some(reason) => consumer.abort(&reason),
            None => {
                let mut endpoints = this.endpoints.borrow_mut();
                let slot = endpoints.consumer(side);
                if slot.is_none() {
                    *slot = Some(consumer);
                }
            }
        }
    }

    fn restore_producer(this: &Rc<Self>, side: Side, mut producer: Box<dyn ByteProducer>) {
        let reason = this.runtime.borrow().abort_reason().cloned();
        match reason {
            Some(reason) => producer.abort(&reason),
            None => {
                let mut endpoints = this.endpoints.borrow_mut();
                let slot = endpoints.producer(side);
                if slot.is_none() {
                    *slot = Some(producer);
                }
            }
        }
    }

    /// Tear the channel down and abort every attached endpoint.
    fn abort(this: &Rc<Self>, reason: AbortReason) {
        let role = {
            let mut rt = this.runtime.borrow_mut();
            if !rt.enter_aborted(reason.clone()) {
                return;
            }
            rt.role()
        };
        warn!(role = ?role, kind = %reason.kind, reason = %reason.message, "channel aborted");
        let endpoints = std::mem::take(&mut *this.endpoints.borrow_mut());
        for mut p in [endpoints.pt_producer, endpoints.ct_producer]
            .into_iter()
            .flatten()
        {
            p.abort(&reason);
        }
        for mut c in [endpoints.pt_consumer, endpoints.ct_consumer]
            .into_iter()
            .flatten()
        {
            c.abort(&reason);
        }
    }
}

/// A VTS channel end-point.
///
/// Dropping the channel abandons it: queued steps find nothing to do and
/// handles report [`FlowError::Aborted`].
pub struct Channel {
    shared: Rc<Shared>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Channel")
            .field(&*self.shared.runtime.borrow())
            .finish()
    }
}

impl Channel {
    /// Create an end-point for `role`. The local banner is queued on the
    /// ciphertext producer right away.
    ///
    /// # Errors
    /// Any [`ConfigError`]; a server additionally needs a local keypair.
    pub fn new(
        role: Role,
        config: ChannelConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        let runtime = Runtime::new(role, &config)?;
        debug!(role = ?role, buffer_len = config.settings.buffer_len, "channel created");
        let shared = Rc::new(Shared {
            runtime: RefCell::new(runtime),
            endpoints: RefCell::new(Endpoints::default()),
            scheduler,
        });
        Shared::schedule(&shared);
        Ok(Self { shared })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.shared.runtime.borrow().role()
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.shared.runtime.borrow().state()
    }

    /// Parameters agreed during the handshake; `None` until open.
    #[must_use]
    pub fn negotiated(&self) -> Option<NegotiatedParameters> {
        self.shared.runtime.borrow().negotiated().cloned()
    }

    /// The authorized peer; `None` until open.
    #[must_use]
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        self.shared.runtime.borrow().peer().cloned()
    }

    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.shared.runtime.borrow().abort_reason().cloned()
    }

    /// Derived session keys while the channel is open.
    #[doc(hidden)]
    #[must_use]
    pub fn session_keys(&self) -> Option<SessionKeys> {
        self.shared.runtime.borrow().keys().cloned()
    }

    /// Abort both sides now with a [`AbortKind::Local`] reason.
    pub fn abort(&self, message: impl Into<String>) {
        Shared::abort(&self.shared, AbortReason::local(message));
    }

    /// Where the application writes plaintext.
    #[must_use]
    pub fn plaintext_in(&self) -> ConsumerHandle {
        ConsumerHandle::new(&self.shared, Side::Plaintext)
    }

    /// Where the transport writes ciphertext.
    #[must_use]
    pub fn ciphertext_in(&self) -> ConsumerHandle {
        ConsumerHandle::new(&self.shared, Side::Ciphertext)
    }

    /// Decrypted plaintext for the application.
    #[must_use]
    pub fn plaintext_out(&self) -> ProducerHandle {
        ProducerHandle::new(&self.shared, Side::Plaintext)
    }

    /// Banner, handshake frames and records for the transport.
    #[must_use]
    pub fn ciphertext_out(&self) -> ProducerHandle {
        ProducerHandle::new(&self.shared, Side::Ciphertext)
    }
}

/// Consumer port of a channel (`plaintext_in` or `ciphertext_in`).
#[derive(Clone)]
pub struct ConsumerHandle {
    channel: Weak<Shared>,
    side: Side,
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("side", &self.side)
            .field("live", &(self.channel.strong_count() > 0))
            .finish()
    }
}

impl ConsumerHandle {
    fn new(shared: &Rc<Shared>, side: Side) -> Self {
        Self {
            channel: Rc::downgrade(shared),
            side,
        }
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Attach the upstream producer. It receives its first credit grant on
    /// the next step; on an aborted channel it is aborted right away.
    pub fn attach(&self, mut producer: Box<dyn ByteProducer>) {
        let Some(shared) = self.channel.upgrade() else {
            producer.abort(&AbortReason::local("channel dropped"));
            return;
        };
        let aborted = shared.runtime.borrow().abort_reason().cloned();
        if let Some(reason) = aborted {
            producer.abort(&reason);
            return;
        }
        shared.runtime.borrow_mut().consumer(self.side).attach();
        *shared.endpoints.borrow_mut().producer(self.side) = Some(producer);
        Shared::schedule(&shared);
    }

    /// Detach and return the upstream producer, if any.
    pub fn detach(&self) -> Option<Box<dyn ByteProducer>> {
        let shared = self.channel.upgrade()?;
        shared.runtime.borrow_mut().consumer(self.side).detach();
        shared.endpoints.borrow_mut().producer(self.side).take()
    }

    /// Credit currently granted to the upstream producer.
    #[must_use]
    pub fn credit(&self) -> Credit {
        self.channel
            .upgrade()
            .map_or(Credit::NONE, |s| s.runtime.borrow_mut().consumer(self.side).credit())
    }
}

impl ByteConsumer for ConsumerHandle {
    fn consume(&mut self, data: &[u8]) -> Result<Credit, FlowError> {
        let shared = self.channel.upgrade().ok_or(FlowError::Aborted)?;
        let accepted = {
            let mut rt = shared.runtime.borrow_mut();
            match rt.state() {
                ChannelState::Aborted => return Err(FlowError::Aborted),
                ChannelState::Closed => return Err(FlowError::EndOfData),
                ChannelState::Handshaking | ChannelState::Open => {}
            }
            let port = rt.consumer(self.side);
            port.accept(data).map(|()| port.credit())
        };
        match &accepted {
            Ok(_) => Shared::schedule(&shared),
            Err(e @ FlowError::CreditExceeded { .. }) => {
                let reason = AbortReason::new(
                    AbortKind::FlowControl,
                    format!("{} producer {e}", self.side),
                );
                Shared::schedule_abort(&shared, reason);
            }
            Err(_) => {}
        }
        accepted
    }

    fn end_of_data(&mut self, clean: bool) {
        let Some(shared) = self.channel.upgrade() else {
            return;
        };
        shared
            .runtime
            .borrow_mut()
            .consumer(self.side)
            .end_of_data()
            .request(clean);
        debug!(side = %self.side, clean, "end of data received");
        Shared::schedule(&shared);
    }

    fn abort(&mut self, reason: &AbortReason) {
        if let Some(shared) = self.channel.upgrade() {
            Shared::abort(&shared, reason.clone());
        }
    }
}

/// Producer port of a channel (`plaintext_out` or `ciphertext_out`).
#[derive(Clone)]
pub struct ProducerHandle {
    channel: Weak<Shared>,
    side: Side,
}

impl fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("side", &self.side)
            .field("live", &(self.channel.strong_count() > 0))
            .finish()
    }
}

impl ProducerHandle {
    fn new(shared: &Rc<Shared>, side: Side) -> Self {
        Self {
            channel: Rc::downgrade(shared),
            side,
        }
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Attach the downstream consumer. Nothing is delivered before it grants
    /// credit; on an aborted channel it is aborted right away.
    pub fn attach(&self, mut consumer: Box<dyn ByteConsumer>) {
        let Some(shared) = self.channel.upgrade() else {
            consumer.abort(&AbortReason::local("channel dropped"));
            return;
        };
        let aborted = shared.runtime.borrow().abort_reason().cloned();
        if let Some(reason) = aborted {
            consumer.abort(&reason);
            return;
        }
        shared.runtime.borrow_mut().producer(self.side).attach();
        *shared.endpoints.borrow_mut().consumer(self.side) = Some(consumer);
        Shared::schedule(&shared);
    }

    /// Detach and return the downstream consumer, if any.
    pub fn detach(&self) -> Option<Box<dyn ByteConsumer>> {
        let shared = self.channel.upgrade()?;
        shared.runtime.borrow_mut().producer(self.side).detach();
        shared.endpoints.borrow_mut().consumer(self.side).take()
    }
}

impl ByteProducer for ProducerHandle {
    fn grant(&mut self, credit: Credit) {
        if let Some(shared) = self.channel.upgrade() {
            shared.runtime.borrow_mut().producer(self.side).grant(credit);
            Shared::schedule(&shared);
        }
    }

    fn abort(&mut self, reason: &AbortReason) {
        if let Some(shared) = self.channel.upgrade() {
            Shared::abort(&shared, reason.clone());
        }
    }
}

/// Pair a producer port with a consumer port, typically one channel's
/// `ciphertext_out` with the other's `ciphertext_in`.
pub fn connect(out: &ProducerHandle, input: &ConsumerHandle) {
    out.attach(Box::new(input.clone()));
    input.attach(Box::new(out.clone()));
}
