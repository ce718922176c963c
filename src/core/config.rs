//! Channel configuration.
//!
//! [`ChannelSettings`] holds the plain, serde-loadable options;
//! [`ChannelConfig`] adds the pluggable collaborators (crypto provider,
//! randomness, authorization policy, certificate verifier) and the local
//! credentials. Only a config that passed [`ChannelConfig::resolve`] reaches
//! a channel.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::adapters::crypto::RustCryptoProvider;
use crate::adapters::random::OsRandom;
use crate::adapters::x509::X509Verifier;
use crate::application::credentials::AcceptAll;
use crate::domain::handshake::{CipherSuite, Credentials};
use crate::domain::hello::DEFAULT_MAX_HELLO_LEN;
use crate::ports::{
    AuthorizationPolicy, CertificateVerifier, CryptoProvider, PrivateKey, RandomSource,
};

pub const DEFAULT_MAX_RSA_KEY_BITS: usize = 4096;
pub const DEFAULT_HANDSHAKE_BYTE_LIMIT: usize = 16 * 1024;
pub const DEFAULT_BUFFER_LEN: usize = 4096;

/// Cipher/mode pairs offered when the settings do not name any, before
/// filtering by provider support.
pub const DEFAULT_CIPHERS: [&str; 3] = ["aes256", "blowfish", "blowfish128"];
pub const DEFAULT_MODES: [&str; 2] = ["cbc", "ofb"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_rsa_key_bits must be a positive multiple of 8, got {0}")]
    RsaBits(usize),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("max_hello_len {0} cannot hold the protocol banner")]
    HelloTooShort(usize),
    #[error("{0} allow-list is empty after filtering by provider support")]
    EmptyAllowList(&'static str),
    #[error("identity and certificate chain are mutually exclusive")]
    IdentityAndChain,
    #[error("local key of {bits} bits exceeds max_rsa_key_bits {max}")]
    LocalKeyTooLarge { bits: usize, max: usize },
    #[error("server role requires a local keypair")]
    MissingKeypair,
}

/// Plain channel options. Every field has a default, so an empty document
/// deserializes to [`ChannelSettings::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelSettings {
    pub max_rsa_key_bits: usize,
    pub handshake_byte_limit: usize,
    pub buffer_len: usize,
    pub max_hello_len: usize,
    /// `None` means every hash the provider supports.
    pub allowed_hashes: Option<Vec<String>>,
    /// `None` means every hash the provider supports.
    pub allowed_macs: Option<Vec<String>>,
    /// `None` means [`DEFAULT_CIPHERS`] × [`DEFAULT_MODES`].
    pub allowed_ciphers: Option<Vec<CipherSuite>>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            max_rsa_key_bits: DEFAULT_MAX_RSA_KEY_BITS,
            handshake_byte_limit: DEFAULT_HANDSHAKE_BYTE_LIMIT,
            buffer_len: DEFAULT_BUFFER_LEN,
            max_hello_len: DEFAULT_MAX_HELLO_LEN,
            allowed_hashes: None,
            allowed_macs: None,
            allowed_ciphers: None,
        }
    }
}

impl ChannelSettings {
    /// Check ranges that do not depend on the provider.
    ///
    /// # Errors
    /// Returns the first violated [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rsa_key_bits == 0 || self.max_rsa_key_bits % 8 != 0 {
            return Err(ConfigError::RsaBits(self.max_rsa_key_bits));
        }
        if self.handshake_byte_limit == 0 {
            return Err(ConfigError::Zero("handshake_byte_limit"));
        }
        if self.buffer_len == 0 {
            return Err(ConfigError::Zero("buffer_len"));
        }
        if self.max_hello_len < crate::domain::hello::banner().len() {
            return Err(ConfigError::HelloTooShort(self.max_hello_len));
        }
        Ok(())
    }
}

/// Algorithm lists after intersecting the settings with provider support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedAlgorithms {
    pub hashes: Vec<String>,
    pub macs: Vec<String>,
    pub ciphers: Vec<CipherSuite>,
}

/// Key material and claimed identity of the local side.
#[derive(Clone, Default)]
pub struct LocalCredentials {
    keypair: Option<Rc<dyn PrivateKey>>,
    credentials: Option<Credentials>,
}

impl fmt::Debug for LocalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCredentials")
            .field("keypair_bits", &self.keypair.as_ref().map(|k| k.modulus_bits()))
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl LocalCredentials {
    /// Build from the optional pieces.
    ///
    /// # Errors
    /// `ConfigError::IdentityAndChain` when both an identity and a chain are
    /// given.
    pub fn new(
        keypair: Option<Rc<dyn PrivateKey>>,
        identity: Option<Vec<u8>>,
        cert_chain: Option<Vec<Vec<u8>>>,
    ) -> Result<Self, ConfigError> {
        let credentials = match (identity, cert_chain) {
            (Some(_), Some(_)) => return Err(ConfigError::IdentityAndChain),
            (Some(id), None) => Some(Credentials::Identity(id)),
            (None, Some(chain)) => Some(Credentials::CertChain(chain)),
            (None, None) => None,
        };
        Ok(Self {
            keypair,
            credentials,
        })
    }

    #[must_use]
    pub fn keypair(&self) -> Option<&Rc<dyn PrivateKey>> {
        self.keypair.as_ref()
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// Settings plus collaborators.
#[derive(Clone)]
pub struct ChannelConfig {
    pub settings: ChannelSettings,
    pub crypto: Rc<dyn CryptoProvider>,
    pub random: Rc<dyn RandomSource>,
    pub padding: Rc<dyn RandomSource>,
    pub policy: Rc<dyn AuthorizationPolicy>,
    pub verifier: Rc<dyn CertificateVerifier>,
    pub credentials: LocalCredentials,
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(ChannelSettings::default())
    }
}

impl ChannelConfig {
    /// Defaults: RustCrypto provider, OS randomness for keys and padding,
    /// accept-all policy, `x509-parser` verifier, no local credentials.
    #[must_use]
    pub fn new(settings: ChannelSettings) -> Self {
        Self {
            settings,
            crypto: Rc::new(RustCryptoProvider::new()),
            random: Rc::new(OsRandom),
            padding: Rc::new(OsRandom),
            policy: Rc::new(AcceptAll),
            verifier: Rc::new(X509Verifier),
            credentials: LocalCredentials::default(),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: LocalCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Rc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_random(mut self, random: Rc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: Rc<dyn RandomSource>) -> Self {
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Rc<dyn CertificateVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Validate the settings and compute the effective algorithm lists.
    ///
    /// # Errors
    /// Any settings violation, an allow-list that ends up empty, or a local
    /// key larger than `max_rsa_key_bits`.
    pub fn resolve(&self) -> Result<AllowedAlgorithms, ConfigError> {
        self.settings.validate()?;
        if let Some(k) = self.credentials.keypair() {
            let bits = k.modulus_bits();
            if bits > self.settings.max_rsa_key_bits {
                return Err(ConfigError::LocalKeyTooLarge {
                    bits,
                    max: self.settings.max_rsa_key_bits,
                });
            }
        }
        let supported_hashes = self.crypto.hashes();
        let filter_names = |configured: &Option<Vec<String>>| -> Vec<String> {
            match configured {
                Some(list) => list
                    .iter()
                    .filter(|h| supported_hashes.contains(h))
                    .cloned()
                    .collect(),
                None => supported_hashes.clone(),
            }
        };
        let hashes = filter_names(&self.settings.allowed_hashes);
        let macs = filter_names(&self.settings.allowed_macs);

        let supported_suites = self.crypto.cipher_suites();
        let wanted = match &self.settings.allowed_ciphers {
            Some(list) => list.clone(),
            None => DEFAULT_CIPHERS
                .iter()
                .flat_map(|c| DEFAULT_MODES.iter().map(move |m| CipherSuite::new(c, m)))
                .collect(),
        };
        let ciphers: Vec<CipherSuite> = wanted
            .into_iter()
            .filter(|s| supported_suites.contains(s))
            .collect();

        if hashes.is_empty() {
            return Err(ConfigError::EmptyAllowList("hash"));
        }
        if macs.is_empty() {
            return Err(ConfigError::EmptyAllowList("mac"));
        }
        if ciphers.is_empty() {
            return Err(ConfigError::EmptyAllowList("cipher"));
        }
        Ok(AllowedAlgorithms {
            hashes,
            macs,
            ciphers,
        })
    }
}
