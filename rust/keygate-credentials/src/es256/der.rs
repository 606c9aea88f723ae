//! DER encoded ECDSA P-256 signatures.

use super::error::P256SignatureError;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// An opaque ECDSA P-256 signature in ASN.1 DER form.
///
/// The value is bound to the payload and key that produced it; see
/// [`super::P256PublicKey::verify`]. Its text form is standard base64.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct P256Signature(Vec<u8>);

impl P256Signature {
    /// Wrap raw DER bytes.
    ///
    /// # Errors
    ///
    /// Returns [`P256SignatureError::Empty`] for an empty byte string. The
    /// DER structure itself is only checked during verification.
    pub fn from_der(bytes: impl Into<Vec<u8>>) -> Result<Self, P256SignatureError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(P256SignatureError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Decode the standard base64 text form.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid base64 or an empty signature.
    pub fn from_base64(encoded: &str) -> Result<Self, P256SignatureError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| P256SignatureError::InvalidBase64(e.to_string()))?;
        Self::from_der(bytes)
    }

    /// The DER bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64 of the DER bytes.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }
}

impl std::fmt::Display for P256Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl std::fmt::Debug for P256Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P256Signature({self})")
    }
}

impl FromStr for P256Signature {
    type Err = P256SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl Serialize for P256Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for P256Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(serde::de::Error::custom)
    }
}
