//! Shared fixtures for the crate's unit tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;

use crate::adapters::rsa_key::RsaKeyPair;
use crate::core::config::{ChannelConfig, ChannelSettings, LocalCredentials};
use crate::domain::flow::{AbortReason, Credit};
use crate::domain::handshake::*;
use crate::ports::crypto::RandomSource;
use crate::ports::stream::{ByteConsumer, ByteProducer, FlowError};

/// Deterministic [`RandomSource`]: a wrapping byte counter.
#[derive(Debug, Default)]
pub struct CountingRandom {
    next: Cell<u8>,
}

impl RandomSource for CountingRandom {
    fn fill(&self, buf: &mut [u8]) {
        for b in buf {
            let v = self.next.get();
            *b = v;
            self.next.set(v.wrapping_add(1));
        }
    }
}

/// A well formed `CLIENT_HELLO` offering every default algorithm.
pub fn mk_client_hello() -> ClientHello {
    ClientHello {
        hashes: vec!["sha256".into(), "sha1".into()],
        ciphers: vec![
            CipherOffer {
                cipher: "aes256".into(),
                modes: vec!["cbc".into(), "ofb".into()],
            },
            CipherOffer {
                cipher: "blowfish".into(),
                modes: vec!["cbc".into()],
            },
        ],
        macs: vec!["sha256".into()],
        random: RandomSeed::from(vec![0x11; 32]),
        max_rsa_bits: Some(4096),
        handshake_limit: Some(16384),
    }
}

/// A well formed `SERVER_PARAMS` choosing aes256/cbc with a 1024-bit key.
pub fn mk_server_params() -> ServerParams {
    ServerParams {
        hash: "sha256".into(),
        cipher: "aes256".into(),
        mode: "cbc".into(),
        mac: "sha256".into(),
        random: RandomSeed::from(vec![0x22; 32]),
        public_key: PublicKeyDescriptor::rsa(&[0xC3; 128], &[1, 0, 1]),
        credentials: Some(Credentials::Identity(b"server".to_vec())),
        max_rsa_bits: Some(4096),
        handshake_limit: None,
    }
}

fn generate(cell: &'static OnceLock<RsaKeyPair>) -> &'static RsaKeyPair {
    cell.get_or_init(|| RsaKeyPair::generate(2048).expect("rsa keygen"))
}

/// Cached 2048-bit keypair; generation is slow so every test shares it.
pub fn test_keypair() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    generate(&KEY)
}

/// A second cached keypair for the other end of a channel.
pub fn peer_keypair() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    generate(&KEY)
}

/// Config with default collaborators, the given settings and an optional
/// keypair.
pub fn config_with(keypair: Option<&RsaKeyPair>, settings: ChannelSettings) -> ChannelConfig {
    let keypair = keypair.map(|k| Rc::new(k.clone()) as Rc<dyn crate::ports::PrivateKey>);
    let creds = LocalCredentials::new(keypair, None, None).expect("credentials");
    ChannelConfig::new(settings).with_credentials(creds)
}

/// Server config: default settings plus [`test_keypair`].
pub fn server_config() -> ChannelConfig {
    config_with(Some(test_keypair()), ChannelSettings::default())
}

/// Client config: default settings, no keypair.
pub fn client_config() -> ChannelConfig {
    config_with(None, ChannelSettings::default())
}

/// DER certificates: leaf issued by intermediate issued by a self-signed root.
#[derive(Debug, Clone)]
pub struct CertChain {
    pub leaf: Vec<u8>,
    pub intermediate: Vec<u8>,
    pub root: Vec<u8>,
}

impl CertChain {
    /// Leaf first, root last.
    pub fn to_vec(&self) -> Vec<Vec<u8>> {
        vec![self.leaf.clone(), self.intermediate.clone(), self.root.clone()]
    }
}

fn ca_params(cn: &str) -> rcgen::CertificateParams {
    let mut p = rcgen::CertificateParams::new(Vec::<String>::new()).expect("params");
    p.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    p.distinguished_name.push(rcgen::DnType::CommonName, cn);
    p
}

/// An RSA key as the subject of a generated certificate.
struct RsaSubject(Vec<u8>);

impl RsaSubject {
    fn new(key: &RsaKeyPair) -> Self {
        use crate::ports::crypto::PrivateKey;
        use rsa::pkcs1::EncodeRsaPublicKey;

        let pk = key.public_key();
        let public = rsa::RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(&pk.modulus),
            rsa::BigUint::from_bytes_be(&pk.exponent),
        )
        .expect("rsa public key");
        Self(public.to_pkcs1_der().expect("pkcs1 der").as_bytes().to_vec())
    }
}

impl rcgen::PublicKeyData for RsaSubject {
    fn der_bytes(&self) -> &[u8] {
        &self.0
    }

    fn algorithm(&self) -> &rcgen::SignatureAlgorithm {
        &rcgen::PKCS_RSA_SHA256
    }
}

/// Root and intermediate carry throwaway EC keys; the leaf certifies `subject`.
fn build_chain(subject: &RsaKeyPair) -> CertChain {
    let root_key = rcgen::KeyPair::generate().expect("root key");
    let root = ca_params("vts test root").self_signed(&root_key).expect("root");
    let int_key = rcgen::KeyPair::generate().expect("intermediate key");
    let intermediate = ca_params("vts test intermediate")
        .signed_by(&int_key, &root, &root_key)
        .expect("intermediate");
    let leaf = rcgen::CertificateParams::new(vec!["peer.vts.test".to_string()])
        .expect("params")
        .signed_by(&RsaSubject::new(subject), &intermediate, &int_key)
        .expect("leaf");
    CertChain {
        leaf: leaf.der().to_vec(),
        intermediate: intermediate.der().to_vec(),
        root: root.der().to_vec(),
    }
}

/// Cached three-level chain whose leaf certifies [`test_keypair`].
pub fn cert_chain() -> CertChain {
    static CHAIN: OnceLock<CertChain> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain(test_keypair())).clone()
}

/// An independent chain for the same key whose root nobody trusts.
pub fn other_cert_chain() -> CertChain {
    static CHAIN: OnceLock<CertChain> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain(test_keypair())).clone()
}

/// Wrap a double so the test keeps a handle after attaching it.
pub fn shared<T>(value: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(value))
}

/// Consumer double that records everything and grants a fixed credit.
#[derive(Debug)]
pub struct RecordingConsumer {
    pub data: Vec<u8>,
    pub credit: Credit,
    pub eof: Option<bool>,
    pub aborted: Option<AbortReason>,
}

impl RecordingConsumer {
    pub fn new(credit: Credit) -> Self {
        Self {
            data: Vec::new(),
            credit,
            eof: None,
            aborted: None,
        }
    }
}

impl ByteConsumer for RecordingConsumer {
    fn consume(&mut self, data: &[u8]) -> Result<Credit, FlowError> {
        if self.aborted.is_some() {
            return Err(FlowError::Aborted);
        }
        self.data.extend_from_slice(data);
        Ok(self.credit)
    }

    fn end_of_data(&mut self, clean: bool) {
        self.eof = Some(clean);
    }

    fn abort(&mut self, reason: &AbortReason) {
        self.aborted = Some(reason.clone());
    }
}

/// Producer double that remembers the last grant.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    pub granted: Vec<Credit>,
    pub aborted: Option<AbortReason>,
}

impl RecordingProducer {
    pub fn last_grant(&self) -> Option<Credit> {
        self.granted.last().copied()
    }
}

impl ByteProducer for RecordingProducer {
    fn grant(&mut self, credit: Credit) {
        self.granted.push(credit);
    }

    fn abort(&mut self, reason: &AbortReason) {
        self.aborted = Some(reason.clone());
    }
}
