//! Channel state and the pump step.
//!
//! [`Runtime`] owns everything a channel mutates: the banner reader, the
//! handshake engine, the record sealer/opener and the four port buffers. Its
//! [`Runtime::advance`] moves bytes as far as buffers and credit allow and
//! returns the calls that must be made on attached endpoints. It never calls
//! an endpoint itself, so the caller can release the state borrow first.

use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::application::handshake::{EngineError, HandshakeFsm, Role};
use crate::core::config::{ChannelConfig, ConfigError};
use crate::domain::flow::{AbortKind, AbortReason, ConsumerPort, Credit, ProducerPort};
use crate::domain::handshake::{NegotiatedParameters, PeerCredentials};
use crate::domain::hello::{HelloReader, banner};
use crate::ports::{AuthorizationPolicy, CryptoProvider, RandomSource};
use crate::protocol::handshake::keyschedule::SessionKeys;
use crate::protocol::record::MAX_RECORD_PAYLOAD;

use super::channel_crypto::{ChannelCryptoError, RecordOpener, RecordSealer};

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Banner exchange and handshake in progress; no plaintext flows.
    Handshaking,
    /// Session keys derived and the peer authorized.
    Open,
    /// Both directions reached acknowledged end of data; resources released.
    Closed,
    /// Torn down by an error or a local request; resources released.
    Aborted,
}

impl ChannelState {
    /// Allowed transitions:
    /// * Handshaking -> Open | Aborted
    /// * Open -> Closed | Aborted
    ///
    /// Closed and Aborted are terminal.
    #[must_use]
    pub fn can_transition(self, next: ChannelState) -> bool {
        use ChannelState::{Aborted, Closed, Handshaking, Open};
        matches!(
            (self, next),
            (Handshaking, Open | Aborted) | (Open, Closed | Aborted)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Aborted)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Handshaking => "handshaking",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
            ChannelState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Which side of the channel a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Plaintext,
    Ciphertext,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Plaintext => "plaintext",
            Side::Ciphertext => "ciphertext",
        })
    }
}

/// Call to make on an attached endpoint once the state borrow is released.
#[derive(Debug)]
pub(super) enum Action {
    /// Hand bytes to the consumer attached to the producer port of `Side`.
    Deliver(Side, Bytes),
    /// Tell the producer attached to the consumer port of `Side` its credit.
    Grant(Side, Credit),
    /// Forward end of data to the consumer attached to the producer port.
    EndOfData(Side, bool),
}

fn abort_from(err: &ChannelCryptoError) -> AbortReason {
    AbortReason::new(err.abort_kind(), err.to_string())
}

pub(super) struct Runtime {
    role: Role,
    state: ChannelState,
    buffer_len: usize,
    crypto: Rc<dyn CryptoProvider>,
    padding: Rc<dyn RandomSource>,
    policy: Rc<dyn AuthorizationPolicy>,
    hello: HelloReader,
    fsm: Option<HandshakeFsm>,
    negotiated: Option<NegotiatedParameters>,
    peer: Option<PeerCredentials>,
    keys: Option<SessionKeys>,
    sealer: Option<RecordSealer>,
    opener: Option<RecordOpener>,
    pt_in: ConsumerPort,
    ct_in: ConsumerPort,
    pt_out: ProducerPort,
    ct_out: ProducerPort,
    abort_reason: Option<AbortReason>,
    /// A step is already queued on the scheduler.
    pub(super) step_queued: bool,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("pt_in", &self.pt_in.buffered())
            .field("ct_in", &self.ct_in.buffered())
            .field("pt_out", &self.pt_out.buffered())
            .field("ct_out", &self.ct_out.buffered())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Fresh channel state with the local banner already queued.
    ///
    /// # Errors
    /// Any [`ConfigError`] from the handshake engine.
    pub(super) fn new(role: Role, config: &ChannelConfig) -> Result<Self, ConfigError> {
        let fsm = HandshakeFsm::new(role, config.clone())?;
        let buffer_len = config.settings.buffer_len;
        let mut ct_out = ProducerPort::new();
        ct_out.push(&banner());
        Ok(Self {
            role,
            state: ChannelState::Handshaking,
            buffer_len,
            crypto: Rc::clone(&config.crypto),
            padding: Rc::clone(&config.padding),
            policy: Rc::clone(&config.policy),
            hello: HelloReader::new(config.settings.max_hello_len),
            fsm: Some(fsm),
            negotiated: None,
            peer: None,
            keys: None,
            sealer: None,
            opener: None,
            pt_in: ConsumerPort::new(buffer_len),
            ct_in: ConsumerPort::new(buffer_len),
            pt_out: ProducerPort::new(),
            ct_out,
            abort_reason: None,
            step_queued: false,
        })
    }

    pub(super) fn role(&self) -> Role {
        self.role
    }

    pub(super) fn state(&self) -> ChannelState {
        self.state
    }

    pub(super) fn negotiated(&self) -> Option<&NegotiatedParameters> {
        self.negotiated.as_ref()
    }

    pub(super) fn peer(&self) -> Option<&PeerCredentials> {
        self.peer.as_ref()
    }

    pub(super) fn keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    pub(super) fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort_reason.as_ref()
    }

    pub(super) fn consumer(&mut self, side: Side) -> &mut ConsumerPort {
        match side {
            Side::Plaintext => &mut self.pt_in,
            Side::Ciphertext => &mut self.ct_in,
        }
    }

    pub(super) fn producer(&mut self, side: Side) -> &mut ProducerPort {
        match side {
            Side::Plaintext => &mut self.pt_out,
            Side::Ciphertext => &mut self.ct_out,
        }
    }

    /// Enter `Aborted` and release everything. Returns `false` if the channel
    /// already was terminal, in which case nothing changes.
    pub(super) fn enter_aborted(&mut self, reason: AbortReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = ChannelState::Aborted;
        self.abort_reason = Some(reason);
        self.release();
        true
    }

    fn release(&mut self) {
        self.fsm = None;
        self.sealer = None;
        self.opener = None;
        self.keys = None;
        self.pt_in.clear();
        self.ct_in.clear();
        self.pt_out.clear();
        self.ct_out.clear();
    }

    /// Move bytes as far as possible and collect endpoint calls.
    ///
    /// # Errors
    /// The reason to abort the channel with; the caller performs the abort.
    pub(super) fn advance(&mut self) -> Result<Vec<Action>, AbortReason> {
        if self.state.is_terminal() {
            return Ok(Vec::new());
        }
        if self.state == ChannelState::Handshaking {
            self.pump_handshake()?;
        }
        if self.state == ChannelState::Open {
            self.pump_inbound()?;
            self.pump_outbound()?;
            self.propagate_end_of_data();
        }

        let mut actions = Vec::new();
        for side in [Side::Ciphertext, Side::Plaintext] {
            self.collect_producer(side, &mut actions);
            self.collect_credit(side, &mut actions);
        }
        self.maybe_close();
        Ok(actions)
    }

    /// Banner, then handshake frames, until the engine reports done.
    fn pump_handshake(&mut self) -> Result<(), AbortReason> {
        let data = self.ct_in.take_all();
        let mut rest = &data[..];
        if !self.hello.is_done() {
            match self.hello.feed(rest) {
                Ok(Some(n)) => {
                    info!(role = ?self.role, "hello validated");
                    rest = &rest[n..];
                    let out = self.fsm_mut()?.start().map_err(engine_abort)?;
                    self.ct_out.push(&out);
                }
                Ok(None) => rest = &[],
                Err(e) => return Err(AbortReason::new(AbortKind::Protocol, e.to_string())),
            }
        }
        if !rest.is_empty() {
            let out = self.fsm_mut()?.receive(rest).map_err(engine_abort)?;
            self.ct_out.push(&out);
        }
        if self.fsm_mut()?.is_done() {
            self.open()?;
        } else if self.ct_in.eof().requested {
            return Err(AbortReason::new(
                AbortKind::Protocol,
                "end of data before the handshake completed",
            ));
        }
        Ok(())
    }

    fn fsm_mut(&mut self) -> Result<&mut HandshakeFsm, AbortReason> {
        self.fsm
            .as_mut()
            .ok_or_else(|| AbortReason::local("handshake engine already released"))
    }

    /// Install the record layer from the handshake outcome.
    fn open(&mut self) -> Result<(), AbortReason> {
        let Some(mut fsm) = self.fsm.take() else {
            return Err(AbortReason::local("handshake engine already released"));
        };
        let outcome = fsm
            .take_outcome()
            .ok_or_else(|| AbortReason::local("handshake finished without session keys"))?;
        let remaining = fsm.take_remaining();
        let (tx, rx) = match self.role {
            Role::Client => (&outcome.keys.client, &outcome.keys.server),
            Role::Server => (&outcome.keys.server, &outcome.keys.client),
        };
        let sealer = RecordSealer::new(
            Rc::clone(&self.crypto),
            Rc::clone(&self.padding),
            &outcome.negotiated,
            tx,
        )
        .map_err(|e| abort_from(&e))?;
        let mut opener = RecordOpener::new(Rc::clone(&self.crypto), &outcome.negotiated, rx)
            .map_err(|e| abort_from(&e))?;
        opener.push(&remaining);

        info!(role = ?self.role, negotiated = %outcome.negotiated, "channel open");
        debug_assert!(self.state.can_transition(ChannelState::Open));
        self.sealer = Some(sealer);
        self.opener = Some(opener);
        self.negotiated = Some(outcome.negotiated);
        self.peer = Some(outcome.peer);
        self.keys = Some(outcome.keys);
        self.state = ChannelState::Open;
        Ok(())
    }

    /// Decrypt ciphertext into the plaintext producer while it is below
    /// `buffer_len`. Ciphertext is only fed to the opener once it holds no
    /// complete record, so undecrypted bytes stay in `ct_in` and keep its
    /// credit from rising.
    fn pump_inbound(&mut self) -> Result<(), AbortReason> {
        let Some(opener) = self.opener.as_mut() else {
            return Ok(());
        };
        while self.pt_out.buffered() <= self.buffer_len {
            match opener.next_record().map_err(|e| abort_from(&e))? {
                Some(payload) => {
                    if let Some(peer) = &self.peer
                        && !self.policy.still_authorized(peer)
                    {
                        return Err(AbortReason::new(
                            AbortKind::Authorization,
                            "peer authorization revoked",
                        ));
                    }
                    self.pt_out.push(&payload);
                }
                None if self.ct_in.buffered() == 0 => break,
                None => opener.push(&self.ct_in.take_all()),
            }
        }
        Ok(())
    }

    /// Seal plaintext chunks of at most `buffer_len` bytes, capped at
    /// [`MAX_RECORD_PAYLOAD`], while the ciphertext producer is below
    /// `buffer_len`.
    fn pump_outbound(&mut self) -> Result<(), AbortReason> {
        let Some(sealer) = self.sealer.as_mut() else {
            return Ok(());
        };
        let chunk_len = self.buffer_len.min(MAX_RECORD_PAYLOAD);
        while self.pt_in.buffered() > 0 && self.ct_out.buffered() <= self.buffer_len {
            let chunk = self.pt_in.take(chunk_len);
            let record = sealer.seal(&chunk).map_err(|e| abort_from(&e))?;
            self.ct_out.push(&record);
        }
        Ok(())
    }

    /// Turn drained inbound end of data into a pending producer end of data.
    fn propagate_end_of_data(&mut self) {
        let inbound_drained =
            self.ct_in.buffered() == 0 && self.pt_out.buffered() <= self.buffer_len;
        if self.ct_in.eof().pending() && inbound_drained {
            let partial = self.opener.as_ref().is_some_and(RecordOpener::has_partial);
            let clean = self.ct_in.eof().clean && !partial;
            debug!(role = ?self.role, clean, "inbound end of data");
            self.pt_out.end_of_data().request(clean);
            self.ct_in.end_of_data().acknowledged = true;
        }
        if self.pt_in.eof().pending() && self.pt_in.buffered() == 0 {
            let clean = self.pt_in.eof().clean;
            debug!(role = ?self.role, clean, "outbound end of data");
            self.ct_out.end_of_data().request(clean);
            self.pt_in.end_of_data().acknowledged = true;
        }
    }

    fn collect_producer(&mut self, side: Side, actions: &mut Vec<Action>) {
        let port = self.producer(side);
        if port.sendable() > 0 {
            actions.push(Action::Deliver(side, port.take_sendable()));
        }
        if port.eof().pending() && port.drained() && port.is_attached() {
            let clean = port.eof().clean;
            port.end_of_data().acknowledged = true;
            actions.push(Action::EndOfData(side, clean));
        }
    }

    /// Whether the consumer port of `side` may hand out more credit.
    fn may_raise(&self, side: Side) -> bool {
        match side {
            Side::Ciphertext => {
                !self.ct_in.eof().requested
                    && (self.state == ChannelState::Handshaking
                        || self.pt_out.buffered() <= self.buffer_len)
            }
            Side::Plaintext => {
                self.state == ChannelState::Open
                    && !self.pt_in.eof().requested
                    && self.ct_out.buffered() <= self.buffer_len
            }
        }
    }

    fn collect_credit(&mut self, side: Side, actions: &mut Vec<Action>) {
        if !self.may_raise(side) {
            return;
        }
        let port = self.consumer(side);
        if port.is_attached() && port.raise_credit(port.available_credit()) {
            actions.push(Action::Grant(side, port.credit()));
        }
    }

    fn maybe_close(&mut self) {
        if self.state != ChannelState::Open {
            return;
        }
        let all_acknowledged = self.pt_in.eof().acknowledged
            && self.ct_in.eof().acknowledged
            && self.pt_out.eof().acknowledged
            && self.ct_out.eof().acknowledged;
        if all_acknowledged {
            info!(role = ?self.role, "channel closed");
            self.state = ChannelState::Closed;
            self.release();
        }
    }
}

fn engine_abort(err: EngineError) -> AbortReason {
    AbortReason::new(err.abort_kind(), err.to_string())
}
