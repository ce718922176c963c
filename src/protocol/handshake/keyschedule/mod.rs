use std::fmt;

use crate::core::crypto::Prf;
use crate::ports::crypto::{CipherParams, CryptoError, CryptoProvider};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// Domain-separation labels (ASCII, no terminator)
pub const L_KEY_EXPANSION: &[u8] = b"vts key expansion";
pub const L_ENVELOPE_KEY: &[u8] = b"vts envelope key";

/// Key, IV and MAC key protecting one direction of the channel.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DirectionKeys {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
    pub mac_key: Vec<u8>,
}

impl fmt::Debug for DirectionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DirectionKeys(key: {}B, iv: {}B, mac_key: {}B)",
            self.key.len(),
            self.iv.len(),
            self.mac_key.len()
        )
    }
}

/// The six session secrets. `client` protects client → server traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub client: DirectionKeys,
    pub server: DirectionKeys,
}

/// Random seeds both sides contributed.
///
/// `server_random2` is `None` when the client presented no public key (the
/// server then never sends `SERVER_SECRET`).
#[derive(Debug, Clone, Copy)]
pub struct SeedMaterial<'a> {
    pub client_random: &'a [u8],
    pub server_random: &'a [u8],
    pub client_random2: &'a [u8],
    pub server_random2: Option<&'a [u8]>,
}

impl SeedMaterial<'_> {
    /// `clientRand1 ∥ serverRand1 ∥ clientRand2 [∥ serverRand2]`
    #[must_use]
    pub fn client_seed(&self) -> Zeroizing<Vec<u8>> {
        let mut s = Zeroizing::new(Vec::new());
        s.extend_from_slice(self.client_random);
        s.extend_from_slice(self.server_random);
        s.extend_from_slice(self.client_random2);
        if let Some(r) = self.server_random2 {
            s.extend_from_slice(r);
        }
        s
    }

    /// `serverRand1 ∥ clientRand1 [∥ serverRand2] ∥ clientRand2`
    #[must_use]
    pub fn server_seed(&self) -> Zeroizing<Vec<u8>> {
        let mut s = Zeroizing::new(Vec::new());
        s.extend_from_slice(self.server_random);
        s.extend_from_slice(self.client_random);
        if let Some(r) = self.server_random2 {
            s.extend_from_slice(r);
        }
        s.extend_from_slice(self.client_random2);
        s
    }
}

fn draw_direction(
    prf: &mut Prf<'_>,
    cipher: CipherParams,
    mac_len: usize,
) -> Result<DirectionKeys, CryptoError> {
    // Order matters: key, then IV, then MAC key.
    let key = prf.draw(cipher.key_len)?;
    let iv = prf.draw(cipher.block_len)?;
    let mac_key = prf.draw(mac_len)?;
    Ok(DirectionKeys {
        key: key.to_vec(),
        iv: iv.to_vec(),
        mac_key: mac_key.to_vec(),
    })
}

/// Derive the session keys from the exchanged seeds.
///
/// Client keys come from the client seed string, server keys from the server
/// seed string, each through `P_hash(seed, "vts key expansion")` over the
/// negotiated handshake hash.
///
/// # Errors
/// Propagates `CryptoError` from the provider (unknown hash / cipher).
pub fn derive_session_keys(
    provider: &dyn CryptoProvider,
    hash: &str,
    cipher: &str,
    mac_hash: &str,
    seeds: &SeedMaterial<'_>,
) -> Result<SessionKeys, CryptoError> {
    let params = provider.cipher_params(cipher)?;
    let mac_len = provider.hash_len(mac_hash)?;
    let client = {
        let seed = seeds.client_seed();
        let mut prf = Prf::new(provider, hash, &seed, L_KEY_EXPANSION)?;
        draw_direction(&mut prf, params, mac_len)?
    };
    let server = {
        let seed = seeds.server_seed();
        let mut prf = Prf::new(provider, hash, &seed, L_KEY_EXPANSION)?;
        draw_direction(&mut prf, params, mac_len)?
    };
    Ok(SessionKeys { client, server })
}

/// Key and IV for the `CLIENT_KEY` body cipher:
/// `P_hash(cipherSeed ∥ clientRand1 ∥ serverRand1, "vts envelope key")`.
///
/// # Errors
/// Propagates `CryptoError` from the provider.
pub fn derive_envelope_keys(
    provider: &dyn CryptoProvider,
    hash: &str,
    cipher: &str,
    cipher_seed: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>), CryptoError> {
    let params = provider.cipher_params(cipher)?;
    let mut secret = Zeroizing::new(Vec::with_capacity(
        cipher_seed.len() + client_random.len() + server_random.len(),
    ));
    secret.extend_from_slice(cipher_seed);
    secret.extend_from_slice(client_random);
    secret.extend_from_slice(server_random);
    let mut prf = Prf::new(provider, hash, &secret, L_ENVELOPE_KEY)?;
    let key = prf.draw(params.key_len)?;
    let iv = prf.draw(params.block_len)?;
    Ok((key, iv))
}
