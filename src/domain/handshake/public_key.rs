use crate::domain::handshake::errors::HandshakeError;
use crate::domain::handshake::params::RESERVED_FIELDS;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Only key algorithm the handshake knows.
pub const RSA_ALG: &str = "rsa";

/// Public key as carried in `SERVER_PARAMS` and the `CLIENT_KEY` body.
///
/// `modulus` and `exponent` are big-endian two's-complement integers, so a
/// peer can encode a negative value and validation has to reject it. The
/// three reserved slots must be `null`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicKeyDescriptor {
    pub alg: String,
    #[serde(with = "serde_bytes")]
    pub modulus: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub exponent: Vec<u8>,
    pub reserved: [Option<u8>; RESERVED_FIELDS],
}

impl fmt::Debug for PublicKeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyDescriptor")
            .field("alg", &self.alg)
            .field("modulus_bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

impl PublicKeyDescriptor {
    /// Build an RSA descriptor from unsigned big-endian magnitudes.
    #[must_use]
    pub fn rsa(modulus: &[u8], exponent: &[u8]) -> Self {
        Self {
            alg: RSA_ALG.to_owned(),
            modulus: to_twos_complement(modulus),
            exponent: to_twos_complement(exponent),
            reserved: [None; RESERVED_FIELDS],
        }
    }

    /// Unsigned magnitude of the modulus, leading zeros stripped. `None` if
    /// the encoded value is negative.
    #[must_use]
    pub fn modulus_magnitude(&self) -> Option<&[u8]> {
        magnitude(&self.modulus)
    }

    #[must_use]
    pub fn exponent_magnitude(&self) -> Option<&[u8]> {
        magnitude(&self.exponent)
    }

    /// Modulus size in bits (0 for a negative or zero modulus).
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.modulus_magnitude().map_or(0, bit_len)
    }

    /// Check algorithm, reserved slots and RSA parameter ranges.
    ///
    /// # Errors
    /// * `UnsupportedKeyAlgorithm` unless `alg` is `"rsa"`.
    /// * `ReservedNotNull` if a reserved slot is set.
    /// * `InvalidPublicKey` when the modulus is not greater than one, the
    ///   exponent is not positive, or the exponent is not below the modulus.
    /// * `KeyTooLarge` when the modulus needs more than `max_bits / 8` bytes.
    pub fn validate(&self, max_bits: usize) -> Result<(), HandshakeError> {
        if self.alg != RSA_ALG {
            return Err(HandshakeError::UnsupportedKeyAlgorithm(self.alg.clone()));
        }
        if self.reserved.iter().any(Option::is_some) {
            return Err(HandshakeError::ReservedNotNull);
        }
        let n = self
            .modulus_magnitude()
            .ok_or(HandshakeError::InvalidPublicKey("negative modulus"))?;
        if n.is_empty() || n == [1] {
            return Err(HandshakeError::InvalidPublicKey(
                "modulus must be greater than one",
            ));
        }
        let e = self
            .exponent_magnitude()
            .ok_or(HandshakeError::InvalidPublicKey("negative exponent"))?;
        if e.is_empty() {
            return Err(HandshakeError::InvalidPublicKey("exponent must be positive"));
        }
        if compare_magnitude(e, n) != Ordering::Less {
            return Err(HandshakeError::InvalidPublicKey(
                "exponent must be less than modulus",
            ));
        }
        if n.len() > max_bits / 8 {
            return Err(HandshakeError::KeyTooLarge {
                bits: bit_len(n),
                max: max_bits,
            });
        }
        Ok(())
    }
}

fn to_twos_complement(unsigned: &[u8]) -> Vec<u8> {
    let start = unsigned.iter().position(|&b| b != 0).unwrap_or(unsigned.len());
    let trimmed = &unsigned[start..];
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.first().is_some_and(|&b| b & 0x80 != 0) {
        out.push(0);
    }
    out.extend_from_slice(trimmed);
    out
}

fn magnitude(twos: &[u8]) -> Option<&[u8]> {
    if twos.first().is_some_and(|&b| b & 0x80 != 0) {
        return None;
    }
    let start = twos.iter().position(|&b| b != 0).unwrap_or(twos.len());
    Some(&twos[start..])
}

fn bit_len(mag: &[u8]) -> usize {
    match mag.first() {
        None => 0,
        Some(&b) => mag.len() * 8 - b.leading_zeros() as usize,
    }
}

fn compare_magnitude(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(modulus: &[u8], exponent: &[u8]) -> PublicKeyDescriptor {
        PublicKeyDescriptor {
            alg: RSA_ALG.into(),
            modulus: modulus.to_vec(),
            exponent: exponent.to_vec(),
            reserved: [None; 3],
        }
    }

    #[test]
    fn rsa_constructor_keeps_values_non_negative() {
        let d = PublicKeyDescriptor::rsa(&[0x00, 0x00, 0xC3, 0x01, 0x07], &[0x01, 0x00, 0x01]);
        assert_eq!(d.modulus, vec![0x00, 0xC3, 0x01, 0x07]);
        assert_eq!(d.exponent, vec![0x01, 0x00, 0x01]);
        assert_eq!(d.modulus_magnitude(), Some(&[0xC3, 0x01, 0x07][..]));
        assert_eq!(d.modulus_bits(), 24);
        d.validate(4096).unwrap();

        // 0xC301 is below the exponent 65537.
        let small = PublicKeyDescriptor::rsa(&[0xC3, 0x01], &[0x01, 0x00, 0x01]);
        assert_eq!(
            small.validate(4096).unwrap_err(),
            HandshakeError::InvalidPublicKey("exponent must be less than modulus")
        );
    }

    #[test]
    fn range_checks() {
        let cases: [(&[u8], &[u8], &str); 5] = [
            (&[0x01], &[0x01], "modulus must be greater than one"),
            (&[], &[0x01], "modulus must be greater than one"),
            (&[0x80, 0x01], &[0x03], "negative modulus"),
            (&[0x7F, 0xFF], &[0xFF], "negative exponent"),
            (&[0x10], &[0x10], "exponent must be less than modulus"),
        ];
        for (n, e, want) in cases {
            let err = key(n, e).validate(4096).unwrap_err();
            assert_eq!(err, HandshakeError::InvalidPublicKey(want), "{n:?}/{e:?}");
        }
        let err = key(&[0x10], &[0x00]).validate(4096).unwrap_err();
        assert_eq!(err, HandshakeError::InvalidPublicKey("exponent must be positive"));
    }

    #[test]
    fn size_limit_is_in_bytes() {
        let mut n = vec![0x7F];
        n.extend(std::iter::repeat_n(0xFF, 63));
        let d = key(&n, &[0x03]);
        assert!(d.validate(512).is_ok());
        assert!(matches!(
            d.validate(504),
            Err(HandshakeError::KeyTooLarge { bits: 511, max: 504 })
        ));
    }

    #[test]
    fn reserved_and_alg_checked() {
        let mut d = key(&[0x10], &[0x03]);
        d.reserved[1] = Some(0);
        assert_eq!(d.validate(4096).unwrap_err(), HandshakeError::ReservedNotNull);
        let mut d = key(&[0x10], &[0x03]);
        d.alg = "dsa".into();
        assert!(matches!(
            d.validate(4096),
            Err(HandshakeError::UnsupportedKeyAlgorithm(_))
        ));
    }

    #[test]
    fn serde_rejects_unknown_fields() {
        #[derive(Serialize)]
        struct Extra<'a> {
            #[serde(flatten)]
            base: &'a PublicKeyDescriptor,
            extra: u8,
        }
        let d = PublicKeyDescriptor::rsa(&[0x10], &[0x03]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&Extra { base: &d, extra: 1 }, &mut buf).unwrap();
        assert!(ciborium::de::from_reader::<PublicKeyDescriptor, _>(&buf[..]).is_err());
    }
}
