//! Error types for P-256 operations.

use thiserror::Error;

/// Errors from generating, importing or exporting a [`super::P256Signer`].
#[derive(Debug, Clone, Error)]
pub enum P256KeyError {
    /// The secret scalar is not a valid P-256 private key.
    #[error("invalid P-256 secret key")]
    InvalidSecretKey,

    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),

    /// Producing a signature failed inside the ECDSA implementation.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<getrandom::Error> for P256KeyError {
    fn from(e: getrandom::Error) -> Self {
        Self::Rng(e)
    }
}

/// Errors when decoding a [`super::P256PublicKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P256PublicKeyError {
    /// The SPKI wrapper is malformed or names another curve.
    #[error("invalid SPKI: {0}")]
    InvalidSpki(String),

    /// The encoded point is not on the P-256 curve.
    #[error("invalid P-256 point")]
    InvalidPoint,

    /// The text form is not valid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Errors when decoding a [`super::P256Signature`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P256SignatureError {
    /// The signature has no bytes at all.
    #[error("signature is empty")]
    Empty,

    /// The text form is not valid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Errors from P-256 signature verification.
#[derive(Debug, Clone, Error)]
pub enum P256VerifyError {
    /// The signature bytes are not a DER encoded ECDSA signature.
    #[error("malformed ECDSA signature: {0}")]
    MalformedSignature(String),

    /// The signature does not match the payload under this key.
    #[error("signature mismatch")]
    Mismatch,
}
