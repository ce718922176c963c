//! Fixtures shared by the integration tests: cached keys and certificate
//! chains, config builders, a connected client/server pair and recording
//! endpoint doubles.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use vts::adapters::rsa_key::RsaKeyPair;
use vts::core::channel::connect;
use vts::ports::stream::{ByteConsumer, ByteProducer, FlowError};
use vts::ports::{AuthorizationPolicy, PrivateKey};
use vts::{
    AbortReason, Channel, ChannelConfig, ChannelSettings, Credit, LocalCredentials, LocalExecutor,
    Role,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn server_key() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyPair::generate(2048).expect("server key"))
}

pub fn client_key() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyPair::generate(2048).expect("client key"))
}

/// A 1024-bit key: one RSA block is too small for a `CLIENT_KEY` header.
pub fn small_key() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyPair::generate(1024).expect("small key"))
}

#[derive(Debug, Clone)]
pub struct CertChain {
    pub leaf: Vec<u8>,
    pub intermediate: Vec<u8>,
    pub root: Vec<u8>,
}

impl CertChain {
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

fn build_chain(name: &str, subject: &RsaKeyPair) -> CertChain {
    let root_key = rcgen::KeyPair::generate().expect("root key");
    let root = ca_params(&format!("{name} root"))
        .self_signed(&root_key)
        .expect("root");
    let int_key = rcgen::KeyPair::generate().expect("intermediate key");
    let intermediate = ca_params(&format!("{name} intermediate"))
        .signed_by(&int_key, &root, &root_key)
        .expect("intermediate");
    let leaf = rcgen::CertificateParams::new(vec![format!("{name}.vts.test")])
        .expect("params")
        .signed_by(&RsaSubject::new(subject), &intermediate, &int_key)
        .expect("leaf");
    CertChain {
        leaf: leaf.der().to_vec(),
        intermediate: intermediate.der().to_vec(),
        root: root.der().to_vec(),
    }
}

/// Leaf certifies [`server_key`].
pub fn server_chain() -> CertChain {
    static CHAIN: OnceLock<CertChain> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain("server", server_key())).clone()
}

pub fn stranger_chain() -> CertChain {
    static CHAIN: OnceLock<CertChain> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain("stranger", server_key())).clone()
}

/// Leaf certifies [`client_key`], so it is wrong for anyone holding another key.
pub fn client_chain() -> CertChain {
    static CHAIN: OnceLock<CertChain> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain("client", client_key())).clone()
}

/// Config with an optional keypair, identity or chain.
pub fn config(
    keypair: Option<&RsaKeyPair>,
    identity: Option<&[u8]>,
    chain: Option<Vec<Vec<u8>>>,
    settings: ChannelSettings,
) -> ChannelConfig {
    let keypair = keypair.map(|k| Rc::new(k.clone()) as Rc<dyn PrivateKey>);
    let creds = LocalCredentials::new(keypair, identity.map(<[u8]>::to_vec), chain)
        .expect("credentials");
    ChannelConfig::new(settings).with_credentials(creds)
}

pub fn client_config() -> ChannelConfig {
    config(None, None, None, ChannelSettings::default())
}

pub fn server_config() -> ChannelConfig {
    config(Some(server_key()), None, None, ChannelSettings::default())
}

pub fn with_policy(cfg: ChannelConfig, policy: impl AuthorizationPolicy + 'static) -> ChannelConfig {
    cfg.with_policy(Rc::new(policy))
}

/// Client and server with their ciphertext ports cross-connected.
pub struct Pair {
    pub exec: LocalExecutor,
    pub client: Channel,
    pub server: Channel,
}

impl Pair {
    /// Build, connect and run until nothing is left to do.
    pub fn run(client: ChannelConfig, server: ChannelConfig) -> Self {
        let pair = Self::unconnected(client, server);
        connect(&pair.client.ciphertext_out(), &pair.server.ciphertext_in());
        connect(&pair.server.ciphertext_out(), &pair.client.ciphertext_in());
        pair.exec.run_until_idle();
        pair
    }

    pub fn unconnected(client: ChannelConfig, server: ChannelConfig) -> Self {
        init_tracing();
        let exec = LocalExecutor::new();
        let client = Channel::new(Role::Client, client, exec.scheduler()).expect("client");
        let server = Channel::new(Role::Server, server, exec.scheduler()).expect("server");
        Self {
            exec,
            client,
            server,
        }
    }
}

/// Application-side sink for a `plaintext_out` port.
#[derive(Debug)]
pub struct Sink {
    pub data: Vec<u8>,
    pub credit: Credit,
    pub eof: Option<bool>,
    pub aborted: Option<AbortReason>,
}

impl Sink {
    /// Attach a sink granting `credit` to the plaintext producer of `ch`.
    pub fn attach(ch: &Channel, credit: Credit) -> Rc<RefCell<Sink>> {
        let sink = Rc::new(RefCell::new(Sink {
            data: Vec::new(),
            credit,
            eof: None,
            aborted: None,
        }));
        let mut out = ch.plaintext_out();
        out.attach(Box::new(Rc::clone(&sink)));
        out.grant(credit);
        sink
    }
}

impl ByteConsumer for Sink {
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

/// Application-side source for a `plaintext_in` port; remembers grants.
#[derive(Debug, Default)]
pub struct Source {
    pub granted: Option<Credit>,
    pub aborted: Option<AbortReason>,
}

impl Source {
    pub fn attach(ch: &Channel) -> Rc<RefCell<Source>> {
        let source = Rc::new(RefCell::new(Source::default()));
        ch.plaintext_in().attach(Box::new(Rc::clone(&source)));
        source
    }

    /// Bytes sendable on top of `sent` under the latest grant.
    pub fn room(&self, sent: u64) -> u64 {
        match self.granted {
            None => 0,
            Some(c) => c.remaining(sent).unwrap_or(u64::MAX),
        }
    }
}

impl ByteProducer for Source {
    fn grant(&mut self, credit: Credit) {
        self.granted = Some(credit);
    }

    fn abort(&mut self, reason: &AbortReason) {
        self.aborted = Some(reason.clone());
    }
}

/// Deterministic payload byte at stream offset `i`.
pub fn pattern(i: u64) -> u8 {
    (i % 251) as u8
}

/// Write `pattern` bytes into `ch`'s plaintext port up to `total`, never past
/// the source's grant, running the executor between writes. Returns the new
/// total written.
pub fn write_pattern(
    exec: &LocalExecutor,
    ch: &Channel,
    source: &Rc<RefCell<Source>>,
    mut sent: u64,
    total: u64,
) -> u64 {
    let mut input = ch.plaintext_in();
    loop {
        let room = source.borrow().room(sent).min(total - sent);
        if room == 0 {
            return sent;
        }
        let chunk: Vec<u8> = (sent..sent + room).map(pattern).collect();
        input.consume(&chunk).expect("within credit");
        sent += room;
        exec.run_until_idle();
    }
}
