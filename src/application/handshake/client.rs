//! Client half: `CLIENT_HELLO`, the `CLIENT_KEY` envelope, `SERVER_SECRET`.

use std::rc::Rc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::cbor::{from_cbor, to_cbor};
use crate::domain::handshake::{
    CipherOffer, ClientHello, ClientKey, ClientKeyBody, ClientKeyHeader, HandshakeMessage,
    NegotiatedParameters, PeerCredentials, PublicKeyDescriptor, RandomSeed, ServerParams,
    ServerSecret, ServerSecretPayload,
};
use crate::ports::crypto::{Direction, RandomSource};
use crate::ports::handshake::HandshakeWire;
use crate::protocol::handshake::keyschedule::derive_envelope_keys;
use crate::protocol::record::pad_inner;

use super::errors::EngineError;
use super::fsm_machine::{HandshakeFsm, from_wire_u32, wire_u32};
use super::fsm_types::HandshakeEvent;

/// Random filler for the body's reserved field, 0..32 bytes.
fn reserved_pad(padding: &dyn RandomSource) -> Vec<u8> {
    let mut len = [0u8; 1];
    padding.fill(&mut len);
    let mut pad = vec![0u8; usize::from(len[0] % 32)];
    padding.fill(&mut pad);
    pad
}

impl<W: HandshakeWire> HandshakeFsm<W> {
    pub(super) fn client_send_hello(&mut self) -> Result<Vec<u8>, EngineError> {
        let hello = ClientHello {
            hashes: self.allowed.hashes.clone(),
            ciphers: CipherOffer::group(&self.allowed.ciphers),
            macs: self.allowed.macs.clone(),
            random: RandomSeed::fresh(self.config.random.as_ref()),
            max_rsa_bits: Some(wire_u32(self.config.settings.max_rsa_key_bits)),
            handshake_limit: Some(wire_u32(self.config.settings.handshake_byte_limit)),
        };
        self.apply(HandshakeEvent::ClientSendHello)?;
        let mut out = Vec::new();
        let msg = HandshakeMessage::ClientHello(hello);
        self.send(&msg, &mut out)?;
        if let HandshakeMessage::ClientHello(hello) = msg {
            self.ctx.client_random = Some(hello.random.clone());
            self.ctx.hello = Some(hello);
        }
        Ok(out)
    }

    pub(super) fn client_on_server_params(
        &mut self,
        params: ServerParams,
        out: &mut Vec<u8>,
    ) -> Result<(), EngineError> {
        self.apply(HandshakeEvent::ClientRecvServerParams)?;
        params.validate(self.config.settings.max_rsa_key_bits)?;
        let hello = self
            .ctx
            .hello
            .as_ref()
            .ok_or_else(|| self.unexpected("SERVER_PARAMS before CLIENT_HELLO"))?;
        // The server may only pick values this side offered.
        if !hello.hashes.contains(&params.hash) {
            return Err(EngineError::InvalidNegotiated("hash"));
        }
        let suite = params.suite();
        if !CipherOffer::offered(&hello.ciphers, &suite) {
            return Err(EngineError::InvalidNegotiated("cipher"));
        }
        if !hello.macs.contains(&params.mac) {
            return Err(EngineError::InvalidNegotiated("mac"));
        }

        let ServerParams {
            hash,
            mac,
            random,
            public_key,
            credentials,
            max_rsa_bits,
            handshake_limit,
            ..
        } = params;
        let negotiated = NegotiatedParameters { hash, suite, mac };
        debug!(role = "client", %negotiated, "negotiation accepted");
        self.ctx.negotiated = Some(negotiated);
        self.ctx.server_random = Some(random);
        self.ctx.peer_max_rsa_bits = from_wire_u32(max_rsa_bits);
        self.peer_limit = from_wire_u32(handshake_limit);
        self.ctx.peer = PeerCredentials {
            public_key: Some(public_key.clone()),
            credentials,
        };
        self.authorize_peer()?;
        self.client_send_key(&public_key, out)
    }

    /// Build and send the two-part `CLIENT_KEY` envelope.
    fn client_send_key(
        &mut self,
        server_key: &PublicKeyDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<(), EngineError> {
        let crypto = Rc::clone(&self.config.crypto);
        let random = Rc::clone(&self.config.random);
        let padding = Rc::clone(&self.config.padding);
        let keypair = self.config.credentials.keypair().cloned();
        if let (Some(k), Some(max)) = (&keypair, self.ctx.peer_max_rsa_bits)
            && k.modulus_bits() > max
        {
            return Err(EngineError::PeerKeyLimit {
                bits: k.modulus_bits(),
                max,
            });
        }
        let negotiated = self.negotiated_or_err()?;

        let client_random2 = RandomSeed::fresh(random.as_ref());
        let cipher_seed = RandomSeed::fresh(random.as_ref());

        let body = ClientKeyBody {
            public_key: keypair.as_ref().map(|k| k.public_key()),
            credentials: self.config.credentials.credentials().cloned(),
            pad: reserved_pad(padding.as_ref()),
        };
        let body_plain = Zeroizing::new(to_cbor(&body)?);
        let digest = crypto.digest(&negotiated.hash, &body_plain)?;

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
                cipher_seed.as_bytes(),
                cr,
                sr,
            )?
        };
        let block_len = crypto.cipher_params(&negotiated.suite.cipher)?.block_len;
        let mut sealed_body = pad_inner(&body_plain, block_len, padding.as_ref())?;
        crypto
            .block_transform(&negotiated.suite, Direction::Encrypt, &key, &iv)?
            .apply(&mut sealed_body)?;

        let header = ClientKeyHeader {
            random: client_random2.clone(),
            cipher_seed,
            digest,
        };
        let header_plain = Zeroizing::new(to_cbor(&header)?);
        let sealed_header = crypto.rsa_encrypt(server_key, &header_plain, random.as_ref())?;

        self.apply(HandshakeEvent::ClientSendClientKey)?;
        self.send(
            &HandshakeMessage::ClientKey(ClientKey {
                header: sealed_header,
                body: sealed_body,
            }),
            out,
        )?;
        self.ctx.client_random2 = Some(client_random2);
        if keypair.is_none() {
            // Nothing further comes from the server; two-seed key schedule.
            self.complete()?;
        }
        Ok(())
    }

    pub(super) fn client_on_server_secret(&mut self, secret: ServerSecret) -> Result<(), EngineError> {
        self.apply(HandshakeEvent::ClientRecvServerSecret)?;
        let keypair = self
            .config
            .credentials
            .keypair()
            .cloned()
            .ok_or_else(|| self.unexpected("SERVER_SECRET without a local key"))?;
        let plain = Zeroizing::new(
            keypair
                .decrypt(&secret.payload)
                .map_err(|_| EngineError::Integrity("SERVER_SECRET could not be decrypted"))?,
        );
        let payload: ServerSecretPayload = from_cbor(&plain)?;
        payload.validate()?;
        self.ctx.server_random2 = Some(payload.random);
        self.complete()
    }
}
