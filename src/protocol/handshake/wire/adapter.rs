use crate::core::cbor::{from_cbor, to_cbor};
use crate::domain::handshake::HandshakeMessage;
use crate::ports::handshake::{HandshakeWire, WireError};
use crate::protocol::handshake::wire::frame::encode_frame;

/// CBOR-over-frame implementation of [`HandshakeWire`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WireAdapter;

impl HandshakeWire for WireAdapter {
    fn encode(&self, msg: &HandshakeMessage) -> Result<Vec<u8>, WireError> {
        let payload = match msg {
            HandshakeMessage::ClientHello(m) => to_cbor(m),
            HandshakeMessage::ServerParams(m) => to_cbor(m.as_ref()),
            HandshakeMessage::ClientKey(m) => to_cbor(m),
            HandshakeMessage::ServerSecret(m) => to_cbor(m),
        }
        .map_err(|e| WireError::Codec(e.to_string()))?;
        encode_frame(msg.frame_type(), &payload).map_err(|e| WireError::Codec(e.to_string()))
    }

    fn decode(&self, frame_type: u8, payload: &[u8]) -> Result<HandshakeMessage, WireError> {
        let codec = |e: crate::core::cbor::CodecError| WireError::Codec(e.to_string());
        Ok(match frame_type {
            HandshakeMessage::CLIENT_HELLO => {
                HandshakeMessage::ClientHello(from_cbor(payload).map_err(codec)?)
            }
            HandshakeMessage::SERVER_PARAMS => {
                HandshakeMessage::ServerParams(Box::new(from_cbor(payload).map_err(codec)?))
            }
            HandshakeMessage::CLIENT_KEY => {
                HandshakeMessage::ClientKey(from_cbor(payload).map_err(codec)?)
            }
            HandshakeMessage::SERVER_SECRET => {
                HandshakeMessage::ServerSecret(from_cbor(payload).map_err(codec)?)
            }
            other => return Err(WireError::UnknownFrame(other)),
        })
    }
}
