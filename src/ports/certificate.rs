//! Certificate parsing / verification boundary.
//!
//! The credential validator only needs a few questions answered about DER
//! certificates; everything X.509 specific stays behind this trait.
use std::time::SystemTime;

use crate::domain::handshake::PublicKeyDescriptor;

/// Failures reported by a [`CertificateVerifier`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CertificateError {
    #[error("certificate could not be parsed: {0}")]
    Malformed(String),
    #[error("certificate is outside its validity period")]
    NotValidAt,
    #[error("certificate signature does not verify against issuer key: {0}")]
    BadSignature(String),
}

pub trait CertificateVerifier {
    /// Check `der` is inside its validity window at `at`.
    ///
    /// # Errors
    /// * `CertificateError::Malformed` if `der` does not parse.
    /// * `CertificateError::NotValidAt` if `at` is outside the window.
    fn check_validity(&self, der: &[u8], at: SystemTime) -> Result<(), CertificateError>;

    /// Check `der` was signed by the key in `issuer_der`.
    ///
    /// # Errors
    /// * `CertificateError::Malformed` if either certificate does not parse.
    /// * `CertificateError::BadSignature` if verification fails.
    fn verify_issued_by(&self, der: &[u8], issuer_der: &[u8]) -> Result<(), CertificateError>;

    /// Whether the subject key of `der` is the RSA key `key`.
    ///
    /// A certificate for any other key algorithm simply does not match.
    ///
    /// # Errors
    /// `CertificateError::Malformed` if `der` or its key info does not parse.
    fn subject_key_matches(
        &self,
        der: &[u8],
        key: &PublicKeyDescriptor,
    ) -> Result<bool, CertificateError>;
}
