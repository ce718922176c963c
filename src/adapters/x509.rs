// src/adapters/x509.rs
use std::time::{SystemTime, UNIX_EPOCH};

use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::time::ASN1Time;

use crate::domain::handshake::PublicKeyDescriptor;
use crate::ports::certificate::{CertificateError, CertificateVerifier};

/// [`CertificateVerifier`] backed by `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509Verifier;

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, CertificateError> {
    let (rest, cert) =
        X509Certificate::from_der(der).map_err(|e| CertificateError::Malformed(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CertificateError::Malformed(format!(
            "{} trailing bytes",
            rest.len()
        )));
    }
    Ok(cert)
}

fn asn1_time(at: SystemTime) -> Result<ASN1Time, CertificateError> {
    let secs = match at.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    };
    ASN1Time::from_timestamp(secs).map_err(|_| CertificateError::NotValidAt)
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl CertificateVerifier for X509Verifier {
    fn check_validity(&self, der: &[u8], at: SystemTime) -> Result<(), CertificateError> {
        let cert = parse(der)?;
        if cert.validity().is_valid_at(asn1_time(at)?) {
            Ok(())
        } else {
            Err(CertificateError::NotValidAt)
        }
    }

    fn verify_issued_by(&self, der: &[u8], issuer_der: &[u8]) -> Result<(), CertificateError> {
        let cert = parse(der)?;
        let issuer = parse(issuer_der)?;
        cert.verify_signature(Some(issuer.public_key()))
            .map_err(|e| CertificateError::BadSignature(e.to_string()))
    }

    fn subject_key_matches(
        &self,
        der: &[u8],
        key: &PublicKeyDescriptor,
    ) -> Result<bool, CertificateError> {
        let cert = parse(der)?;
        let spki = cert
            .public_key()
            .parsed()
            .map_err(|e| CertificateError::Malformed(e.to_string()))?;
        let PublicKey::RSA(rsa) = spki else {
            return Ok(false);
        };
        let (Some(n), Some(e)) = (key.modulus_magnitude(), key.exponent_magnitude()) else {
            return Ok(false);
        };
        Ok(strip_zeros(rsa.modulus) == n && strip_zeros(rsa.exponent) == e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::crypto::PrivateKey;
    use crate::test_support::{CertChain, cert_chain, peer_keypair, test_keypair};
    use std::time::Duration;

    #[test]
    fn chain_links_verify() {
        let CertChain { leaf, intermediate, root } = cert_chain();
        let v = X509Verifier;
        v.verify_issued_by(&leaf, &intermediate).unwrap();
        v.verify_issued_by(&intermediate, &root).unwrap();
        v.verify_issued_by(&root, &root).unwrap();
        assert!(matches!(
            v.verify_issued_by(&leaf, &root),
            Err(CertificateError::BadSignature(_))
        ));
    }

    #[test]
    fn validity_window() {
        let chain = cert_chain();
        let v = X509Verifier;
        v.check_validity(&chain.leaf, SystemTime::now()).unwrap();
        let ancient = UNIX_EPOCH + Duration::from_secs(86_400);
        assert_eq!(
            v.check_validity(&chain.leaf, ancient).unwrap_err(),
            CertificateError::NotValidAt
        );
    }

    #[test]
    fn malformed_and_trailing_rejected() {
        let v = X509Verifier;
        assert!(matches!(
            v.check_validity(b"junk", SystemTime::now()),
            Err(CertificateError::Malformed(_))
        ));
        let mut der = cert_chain().root;
        der.push(0);
        assert!(matches!(
            v.check_validity(&der, SystemTime::now()),
            Err(CertificateError::Malformed(_))
        ));
    }

    #[test]
    fn leaf_carries_the_server_key() {
        let chain = cert_chain();
        let v = X509Verifier;
        assert!(v.subject_key_matches(&chain.leaf, &test_keypair().public_key()).unwrap());
        assert!(!v.subject_key_matches(&chain.leaf, &peer_keypair().public_key()).unwrap());
        // The intermediate holds an EC key, which never equals an RSA key.
        assert!(!v
            .subject_key_matches(&chain.intermediate, &test_keypair().public_key())
            .unwrap());
        assert!(matches!(
            v.subject_key_matches(b"junk", &test_keypair().public_key()),
            Err(CertificateError::Malformed(_))
        ));
    }
}
