//! Server half: negotiation, `SERVER_PARAMS`, opening the `CLIENT_KEY`
//! envelope, `SERVER_SECRET`.

use std::rc::Rc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::cbor::{from_cbor, to_cbor};
use crate::core::config::ConfigError;
use crate::domain::handshake::{
    ClientHello, ClientKey, ClientKeyBody, ClientKeyHeader, HandshakeMessage,
    NegotiatedParameters, PeerCredentials, RandomSeed, ServerParams, ServerSecret,
    ServerSecretPayload, first_match, first_suite_match,
};
use crate::ports::crypto::Direction;
use crate::ports::handshake::HandshakeWire;
use crate::protocol::handshake::keyschedule::derive_envelope_keys;
use crate::protocol::record::unpad_inner;

use super::errors::EngineError;
use super::fsm_machine::{HandshakeFsm, from_wire_u32, wire_u32};
use super::fsm_types::HandshakeEvent;

impl<W: HandshakeWire> HandshakeFsm<W> {
    pub(super) fn server_on_client_hello(
        &mut self,
        hello: ClientHello,
        out: &mut Vec<u8>,
    ) -> Result<(), EngineError> {
        self.apply(HandshakeEvent::ServerRecvClientHello)?;
        hello.validate()?;

        let hash = first_match(&hello.hashes, &self.allowed.hashes)
            .ok_or(EngineError::NoCommonAlgorithm("hash"))?
            .to_owned();
        let suite = first_suite_match(&hello.ciphers, &self.allowed.ciphers)
            .ok_or(EngineError::NoCommonAlgorithm("cipher"))?;
        let mac = first_match(&hello.macs, &self.allowed.macs)
            .ok_or(EngineError::NoCommonAlgorithm("mac"))?
            .to_owned();
        let negotiated = NegotiatedParameters { hash, suite, mac };
        debug!(role = "server", %negotiated, "negotiation selected");

        self.peer_limit = from_wire_u32(hello.handshake_limit);
        self.ctx.peer_max_rsa_bits = from_wire_u32(hello.max_rsa_bits);

        let keypair = self
            .config
            .credentials
            .keypair()
            .cloned()
            .ok_or(ConfigError::MissingKeypair)?;
        if let Some(max) = self.ctx.peer_max_rsa_bits
            && keypair.modulus_bits() > max
        {
            return Err(EngineError::PeerKeyLimit {
                bits: keypair.modulus_bits(),
                max,
            });
        }

        let server_random = RandomSeed::fresh(self.config.random.as_ref());
        let params = ServerParams {
            hash: negotiated.hash.clone(),
            cipher: negotiated.suite.cipher.clone(),
            mode: negotiated.suite.mode.clone(),
            mac: negotiated.mac.clone(),
            random: server_random.clone(),
            public_key: keypair.public_key(),
            credentials: self.config.credentials.credentials().cloned(),
            max_rsa_bits: Some(wire_u32(self.config.settings.max_rsa_key_bits)),
            handshake_limit: Some(wire_u32(self.config.settings.handshake_byte_limit)),
        };
        self.ctx.client_random = Some(hello.random);
        self.ctx.server_random = Some(server_random);
        self.ctx.negotiated = Some(negotiated);

        self.apply(HandshakeEvent::ServerSendServerParams)?;
        self.send(&HandshakeMessage::ServerParams(Box::new(params)), out)
    }

    /// Open and check the envelope, authorize the client, answer with
    /// `SERVER_SECRET` when the client sent a key, derive the session keys.
    ///
    /// Checks run in this order: header decryption, header decoding, body
    /// decryption and unpadding, digest comparison, body decoding.
    pub(super) fn server_on_client_key(
        &mut self,
        key_msg: ClientKey,
        out: &mut Vec<u8>,
    ) -> Result<(), EngineError> {
        self.apply(HandshakeEvent::ServerRecvClientKey)?;
        let crypto = Rc::clone(&self.config.crypto);
        let random = Rc::clone(&self.config.random);
        let keypair = self
            .config
            .credentials
            .keypair()
            .cloned()
            .ok_or(ConfigError::MissingKeypair)?;
        let negotiated = self.negotiated_or_err()?;

        let header_plain = Zeroizing::new(
            keypair
                .decrypt(&key_msg.header)
                .map_err(|_| EngineError::Integrity("CLIENT_KEY header could not be decrypted"))?,
        );
        let header: ClientKeyHeader = from_cbor(&header_plain)?;
        header.validate()?;

        let (key, iv) = {
            let cr = self.ctx.client_random.as_ref().map(RandomSeed::as_bytes);
            let sr = self.ctx.server_random.as_ref().map(RandomSeed::as_bytes);
            let (Some(cr), Some(sr)) = (cr, sr) else {
                return Err(self.unexpected("CLIENT_KEY before randoms"));
            };
            derive_envelope_keys(
                crypto.as_ref(),
                &negotiated.hash,
                &negotiated.suite.cipher,
                header.cipher_seed.as_bytes(),
                cr,
                sr,
            )?
        };
        let block_len = crypto.cipher_params(&negotiated.suite.cipher)?.block_len;
        let mut body_plain = Zeroizing::new(key_msg.body);
        crypto
            .block_transform(&negotiated.suite, Direction::Decrypt, &key, &iv)?
            .apply(&mut body_plain)?;
        let inner = unpad_inner(&body_plain, block_len)?;
        let digest = crypto.digest(&negotiated.hash, inner)?;
        if digest != header.digest {
            return Err(EngineError::Integrity("CLIENT_KEY digest mismatch"));
        }
        let body: ClientKeyBody = from_cbor(inner)?;
        body.validate(self.config.settings.max_rsa_key_bits)?;

        self.ctx.peer = PeerCredentials {
            public_key: body.public_key,
            credentials: body.credentials,
        };
        self.authorize_peer()?;
        self.ctx.client_random2 = Some(header.random);

        if let Some(client_key) = self.ctx.peer.public_key.clone() {
            let server_random2 = RandomSeed::fresh(random.as_ref());
            let payload = Zeroizing::new(to_cbor(&ServerSecretPayload {
                random: server_random2.clone(),
            })?);
            let sealed = crypto.rsa_encrypt(&client_key, &payload, random.as_ref())?;
            self.ctx.server_random2 = Some(server_random2);
            self.apply(HandshakeEvent::ServerSendServerSecret)?;
            self.send(
                &HandshakeMessage::ServerSecret(ServerSecret { payload: sealed }),
                out,
            )?;
        }
        self.complete()
    }
}
