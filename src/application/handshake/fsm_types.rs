use crate::domain::handshake::{NegotiatedParameters, PeerCredentials};
use crate::protocol::handshake::keyschedule::SessionKeys;

/// Endpoint role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends `CLIENT_HELLO` and `CLIENT_KEY`; answers nothing else.
    Client,
    /// Chooses the algorithms, owns the RSA key the envelope is sealed to.
    Server,
}

/// Progress of one handshake. Linear per role; never moves backwards.
///
/// Client: `Init → SentHello → GotServerParams → SentClientKey →
/// [GotServerSecret] → Done`.
///
/// Server: `Init → AwaitClientHello → GotClientHello → SentServerParams →
/// GotClientKey → [SentServerSecret] → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    /// Client: hello sent, waiting for `SERVER_PARAMS`.
    SentHello,
    GotServerParams,
    /// Client: envelope sent. Waits for `SERVER_SECRET` only when the client
    /// presented a public key.
    SentClientKey,
    GotServerSecret,
    /// Server: banner validated, waiting for `CLIENT_HELLO`.
    AwaitClientHello,
    GotClientHello,
    /// Server: parameters sent, waiting for `CLIENT_KEY`.
    SentServerParams,
    GotClientKey,
    SentServerSecret,
    /// Session keys derived and credentials authorized.
    Done,
}

/// Triggers of [`HandshakeState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    ClientSendHello,
    ClientRecvServerParams,
    ClientSendClientKey,
    ClientRecvServerSecret,
    ServerStart,
    ServerRecvClientHello,
    ServerSendServerParams,
    ServerRecvClientKey,
    ServerSendServerSecret,
    /// Keys derived; valid from the last state of either role.
    Complete,
}

/// What a finished handshake hands to the record pump.
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub negotiated: NegotiatedParameters,
    pub keys: SessionKeys,
    pub peer: PeerCredentials,
}
