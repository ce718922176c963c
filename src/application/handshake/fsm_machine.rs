use std::collections::BTreeMap;
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::application::credentials::validate_credentials;
use crate::core::config::{AllowedAlgorithms, ChannelConfig, ConfigError};
use crate::domain::handshake::{
    ClientHello, HandshakeMessage, NegotiatedParameters, PeerCredentials, RandomSeed,
};
use crate::ports::handshake::HandshakeWire;
use crate::protocol::handshake::keyschedule::{SeedMaterial, derive_session_keys};
use crate::protocol::handshake::wire::{FrameDecoder, WireAdapter};

use super::errors::EngineError;
use super::fsm_types::{HandshakeEvent, HandshakeOutcome, HandshakeState, Role};

/// Values collected while the handshake runs.
#[derive(Debug, Default)]
pub(super) struct Progress {
    /// Client only: the offer, kept to check the server's echo.
    pub(super) hello: Option<ClientHello>,
    pub(super) client_random: Option<RandomSeed>,
    pub(super) server_random: Option<RandomSeed>,
    pub(super) client_random2: Option<RandomSeed>,
    pub(super) server_random2: Option<RandomSeed>,
    pub(super) negotiated: Option<NegotiatedParameters>,
    pub(super) peer: PeerCredentials,
    pub(super) peer_max_rsa_bits: Option<usize>,
}

/// Drives one side of the VTS handshake over a byte stream.
///
/// Bytes from the peer go in through [`HandshakeFsm::receive`], which
/// returns the bytes to send back. Frames are interpreted one at a time in
/// arrival order; a frame for a later step is held until the earlier steps
/// are applied. Once [`HandshakeFsm::is_done`] the outcome (negotiated
/// parameters, session keys, authorized peer credentials) can be taken and
/// any bytes that followed the last handshake frame belong to the record
/// layer ([`HandshakeFsm::take_remaining`]).
///
/// Every error is fatal: the caller aborts the channel and drops the FSM.
pub struct HandshakeFsm<W: HandshakeWire = WireAdapter> {
    pub(super) role: Role,
    pub(super) state: HandshakeState,
    pub(super) wire: W,
    pub(super) config: ChannelConfig,
    pub(super) allowed: AllowedAlgorithms,
    pub(super) ctx: Progress,
    pub(super) peer_limit: Option<usize>,
    decoder: FrameDecoder,
    next_position: usize,
    held: BTreeMap<usize, HandshakeMessage>,
    sent: usize,
    outcome: Option<HandshakeOutcome>,
}

impl<W: HandshakeWire> std::fmt::Debug for HandshakeFsm<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeFsm")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("received", &self.decoder.received())
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

pub(super) fn wire_u32(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn seed_bytes(seed: &Option<RandomSeed>, missing: EngineError) -> Result<&[u8], EngineError> {
    seed.as_ref().map(RandomSeed::as_bytes).ok_or(missing)
}

pub(super) fn from_wire_u32(v: Option<u32>) -> Option<usize> {
    v.map(|v| usize::try_from(v).unwrap_or(usize::MAX))
}

impl HandshakeFsm<WireAdapter> {
    /// FSM using the CBOR frame codec.
    ///
    /// # Errors
    /// See [`HandshakeFsm::with_wire`].
    pub fn new(role: Role, config: ChannelConfig) -> Result<Self, ConfigError> {
        Self::with_wire(role, config, WireAdapter)
    }
}

impl<W: HandshakeWire> HandshakeFsm<W> {
    /// # Errors
    /// Any [`ConfigError`] from resolving the configuration, or
    /// `ConfigError::MissingKeypair` for a server without a keypair.
    pub fn with_wire(role: Role, config: ChannelConfig, wire: W) -> Result<Self, ConfigError> {
        let allowed = config.resolve()?;
        if role == Role::Server && config.credentials.keypair().is_none() {
            return Err(ConfigError::MissingKeypair);
        }
        let limit = config.settings.handshake_byte_limit;
        Ok(Self {
            role,
            state: HandshakeState::Init,
            wire,
            config,
            allowed,
            ctx: Progress::default(),
            peer_limit: None,
            decoder: FrameDecoder::new(limit),
            next_position: 0,
            held: BTreeMap::new(),
            sent: 0,
            outcome: None,
        })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == HandshakeState::Done
    }

    /// Parameters fixed so far (set once `SERVER_PARAMS` is sent or accepted).
    #[must_use]
    pub fn negotiated(&self) -> Option<&NegotiatedParameters> {
        self.ctx.negotiated.as_ref()
    }

    #[must_use]
    pub fn peer(&self) -> &PeerCredentials {
        &self.ctx.peer
    }

    /// Begin the handshake once the peer banner validated. Returns the bytes
    /// to send (the client's `CLIENT_HELLO`; nothing for the server).
    ///
    /// # Errors
    /// Invalid transition, or a failure encoding the hello.
    pub fn start(&mut self) -> Result<Vec<u8>, EngineError> {
        match self.role {
            Role::Client => self.client_send_hello(),
            Role::Server => {
                self.apply(HandshakeEvent::ServerStart)?;
                Ok(Vec::new())
            }
        }
    }

    /// Feed handshake bytes from the peer; returns the reply bytes.
    ///
    /// Stops interpreting frames as soon as the handshake is done, so record
    /// bytes that arrived in the same chunk stay untouched.
    ///
    /// # Errors
    /// Any [`EngineError`]; the handshake cannot continue afterwards.
    pub fn receive(&mut self, data: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.decoder.push(data);
        let mut out = Vec::new();
        while !self.is_done() {
            let Some((frame_type, payload)) = self.decoder.next_frame()? else {
                break;
            };
            let msg = self.wire.decode(frame_type, &payload)?;
            debug!(role = ?self.role, message = msg.name(), len = payload.len(), "handshake message received");
            self.dispatch(msg, &mut out)?;
        }
        Ok(out)
    }

    /// Outcome of a finished handshake; `None` before `Done` or once taken.
    pub fn take_outcome(&mut self) -> Option<HandshakeOutcome> {
        self.outcome.take()
    }

    /// Bytes received after the last handshake frame.
    pub fn take_remaining(&mut self) -> Bytes {
        self.decoder.take_remaining()
    }

    /// Sequence position of an inbound frame type for this role, `None` when
    /// the role never receives it.
    fn position_of(&self, frame_type: u8) -> Option<usize> {
        match (self.role, frame_type) {
            (Role::Client, HandshakeMessage::SERVER_PARAMS)
            | (Role::Server, HandshakeMessage::CLIENT_HELLO) => Some(0),
            (Role::Client, HandshakeMessage::SERVER_SECRET)
                if self.config.credentials.keypair().is_some() =>
            {
                Some(1)
            }
            (Role::Server, HandshakeMessage::CLIENT_KEY) => Some(1),
            _ => None,
        }
    }

    fn dispatch(&mut self, msg: HandshakeMessage, out: &mut Vec<u8>) -> Result<(), EngineError> {
        let Some(position) = self.position_of(msg.frame_type()) else {
            return Err(self.unexpected(msg.name()));
        };
        if position < self.next_position {
            return Err(self.unexpected(msg.name()));
        }
        if position > self.next_position {
            if self.held.contains_key(&position) {
                return Err(EngineError::Duplicate(msg.name()));
            }
            debug!(role = ?self.role, message = msg.name(), "holding early handshake message");
            self.held.insert(position, msg);
            return Ok(());
        }
        self.handle(msg, out)?;
        self.next_position += 1;
        while let Some(next) = self.held.remove(&self.next_position) {
            self.handle(next, out)?;
            self.next_position += 1;
        }
        if self.is_done()
            && let Some((_, left)) = self.held.first_key_value()
        {
            return Err(self.unexpected(left.name()));
        }
        Ok(())
    }

    fn handle(&mut self, msg: HandshakeMessage, out: &mut Vec<u8>) -> Result<(), EngineError> {
        match (self.role, msg) {
            (Role::Client, HandshakeMessage::ServerParams(p)) => {
                self.client_on_server_params(*p, out)
            }
            (Role::Client, HandshakeMessage::ServerSecret(s)) => self.client_on_server_secret(s),
            (Role::Server, HandshakeMessage::ClientHello(h)) => {
                self.server_on_client_hello(h, out)
            }
            (Role::Server, HandshakeMessage::ClientKey(k)) => self.server_on_client_key(k, out),
            (_, other) => Err(self.unexpected(other.name())),
        }
    }

    pub(super) fn unexpected(&self, message: &'static str) -> EngineError {
        EngineError::Unexpected {
            message,
            state: self.state,
        }
    }

    /// Encode `msg` into `out`, honouring the byte limit the peer advertised.
    pub(super) fn send(&mut self, msg: &HandshakeMessage, out: &mut Vec<u8>) -> Result<(), EngineError> {
        let frame = self.wire.encode(msg)?;
        if let Some(limit) = self.peer_limit {
            let remaining = limit.saturating_sub(self.sent);
            if frame.len() > remaining {
                return Err(EngineError::PeerByteLimit {
                    len: frame.len(),
                    remaining,
                });
            }
        }
        self.sent += frame.len();
        debug!(role = ?self.role, message = msg.name(), len = frame.len(), "handshake message sent");
        out.extend_from_slice(&frame);
        Ok(())
    }

    pub(super) fn negotiated_or_err(&self) -> Result<NegotiatedParameters, EngineError> {
        self.ctx
            .negotiated
            .clone()
            .ok_or_else(|| self.unexpected("key exchange before negotiation"))
    }

    /// Run the credential validator over what the peer presented.
    pub(super) fn authorize_peer(&self) -> Result<(), EngineError> {
        let peer = &self.ctx.peer;
        match validate_credentials(
            peer,
            self.config.policy.as_ref(),
            self.config.verifier.as_ref(),
            SystemTime::now(),
        ) {
            Ok(()) => {
                info!(
                    role = ?self.role,
                    identity = peer.identity().is_some(),
                    chain_len = peer.cert_chain().map_or(0, <[Vec<u8>]>::len),
                    "peer authorized"
                );
                Ok(())
            }
            Err(e) => {
                warn!(role = ?self.role, error = %e, "peer rejected");
                Err(e.into())
            }
        }
    }

    /// Derive the session keys from the collected seeds and finish.
    pub(super) fn complete(&mut self) -> Result<(), EngineError> {
        let negotiated = self.negotiated_or_err()?;
        let keys = {
            let seeds = SeedMaterial {
                client_random: seed_bytes(
                    &self.ctx.client_random,
                    self.unexpected("missing client random"),
                )?,
                server_random: seed_bytes(
                    &self.ctx.server_random,
                    self.unexpected("missing server random"),
                )?,
                client_random2: seed_bytes(
                    &self.ctx.client_random2,
                    self.unexpected("missing client random2"),
                )?,
                server_random2: self.ctx.server_random2.as_ref().map(RandomSeed::as_bytes),
            };
            derive_session_keys(
                self.config.crypto.as_ref(),
                &negotiated.hash,
                &negotiated.suite.cipher,
                &negotiated.mac,
                &seeds,
            )?
        };
        self.apply(HandshakeEvent::Complete)?;
        info!(
            role = ?self.role,
            cipher = %negotiated.suite,
            hash = %negotiated.hash,
            mac = %negotiated.mac,
            four_seed = self.ctx.server_random2.is_some(),
            "session keys derived"
        );
        self.outcome = Some(HandshakeOutcome {
            negotiated,
            keys,
            peer: self.ctx.peer.clone(),
        });
        Ok(())
    }

    fn state_ordinal(state: HandshakeState) -> u8 {
        match state {
            HandshakeState::Init => 0,
            HandshakeState::SentHello | HandshakeState::AwaitClientHello => 1,
            HandshakeState::GotServerParams | HandshakeState::GotClientHello => 2,
            HandshakeState::SentClientKey | HandshakeState::SentServerParams => 3,
            HandshakeState::GotServerSecret | HandshakeState::GotClientKey => 4,
            HandshakeState::SentServerSecret => 5,
            HandshakeState::Done => 6,
        }
    }

    pub(super) fn apply(&mut self, ev: HandshakeEvent) -> Result<(), EngineError> {
        use HandshakeEvent as E;
        use HandshakeState as S;
        let old = self.state;
        let new = match (self.role, old, ev) {
            (Role::Client, S::Init, E::ClientSendHello) => S::SentHello,
            (Role::Client, S::SentHello, E::ClientRecvServerParams) => S::GotServerParams,
            (Role::Client, S::GotServerParams, E::ClientSendClientKey) => S::SentClientKey,
            (Role::Client, S::SentClientKey, E::ClientRecvServerSecret) => S::GotServerSecret,
            (Role::Server, S::Init, E::ServerStart) => S::AwaitClientHello,
            (Role::Server, S::AwaitClientHello, E::ServerRecvClientHello) => S::GotClientHello,
            (Role::Server, S::GotClientHello, E::ServerSendServerParams) => S::SentServerParams,
            (Role::Server, S::SentServerParams, E::ServerRecvClientKey) => S::GotClientKey,
            (Role::Server, S::GotClientKey, E::ServerSendServerSecret) => S::SentServerSecret,
            (
                Role::Client,
                S::SentClientKey | S::GotServerSecret,
                E::Complete,
            )
            | (Role::Server, S::GotClientKey | S::SentServerSecret, E::Complete) => S::Done,
            _ => {
                return Err(EngineError::Unexpected {
                    message: "transition",
                    state: old,
                });
            }
        };
        debug_assert!(
            Self::state_ordinal(new) > Self::state_ordinal(old),
            "state regression: {old:?} -> {new:?}"
        );
        self.state = new;
        Ok(())
    }
}
