//! P-256 public key and verifier.
//!
//! Verification hashes the payload with SHA-256 and checks the DER encoded
//! ECDSA signature against it. It needs no secret material and has no side
//! effects, so any number of callers may verify concurrently.

use super::{
    error::{P256PublicKeyError, P256VerifyError},
    der::P256Signature,
};
use base64::Engine;
use keygate_common::Fingerprint;
use p256::ecdsa::signature::Verifier as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Expected SPKI header for a P-256 uncompressed public key (26 bytes).
///
/// ```text
/// SEQUENCE (89 bytes)
///   SEQUENCE (19 bytes)
///     OID 1.2.840.10045.2.1 (ecPublicKey)
///     OID 1.2.840.10045.3.1.7 (prime256v1 / P-256)
///   BIT STRING (66 bytes, 0 unused bits)
///     04 || x || y  (65-byte uncompressed point)
/// ```
pub const P256_SPKI_HEADER: [u8; 26] = [
    0x30, 0x59, // SEQUENCE, 89 bytes
    0x30, 0x13, // SEQUENCE, 19 bytes
    0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // OID ecPublicKey
    0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // OID prime256v1
    0x03, 0x42, // BIT STRING, 66 bytes
    0x00, // 0 unused bits
];

/// 26-byte header + 65-byte uncompressed point.
const P256_SPKI_LEN: usize = 91;

/// The exportable half of a P-256 key pair.
#[derive(Debug, Clone, Copy)]
pub struct P256PublicKey {
    key: p256::ecdsa::VerifyingKey,
}

impl P256PublicKey {
    /// Create a public key from a SEC1 encoded point (33 bytes compressed or
    /// 65 bytes uncompressed).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid P-256 point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, P256PublicKeyError> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| P256PublicKeyError::InvalidPoint)?;
        Ok(Self { key })
    }

    /// Parse a public key from SPKI (SubjectPublicKeyInfo) DER encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER is not a P-256 SPKI with an uncompressed
    /// point.
    pub fn from_spki_der(spki: &[u8]) -> Result<Self, P256PublicKeyError> {
        if spki.len() != P256_SPKI_LEN {
            return Err(P256PublicKeyError::InvalidSpki(format!(
                "expected {P256_SPKI_LEN}-byte SPKI, got {} bytes",
                spki.len()
            )));
        }
        if spki[..P256_SPKI_HEADER.len()] != P256_SPKI_HEADER {
            return Err(P256PublicKeyError::InvalidSpki(
                "SPKI header does not match P-256".into(),
            ));
        }
        Self::from_sec1_bytes(&spki[P256_SPKI_HEADER.len()..])
    }

    /// Decode the base64 text form. Line breaks are tolerated, since some
    /// platforms wrap base64 at 64 columns.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid base64 or an invalid SPKI.
    pub fn from_base64(encoded: &str) -> Result<Self, P256PublicKeyError> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let spki = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| P256PublicKeyError::InvalidBase64(e.to_string()))?;
        Self::from_spki_der(&spki)
    }

    /// Get the inner P-256 verifying key.
    #[must_use]
    pub const fn verifying_key(&self) -> &p256::ecdsa::VerifyingKey {
        &self.key
    }

    /// The uncompressed SEC1 point (65 bytes: `04 || x || y`).
    #[must_use]
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// The SPKI DER encoding (91 bytes).
    #[must_use]
    pub fn to_spki_der(&self) -> Vec<u8> {
        let mut spki = Vec::with_capacity(P256_SPKI_LEN);
        spki.extend_from_slice(&P256_SPKI_HEADER);
        spki.extend_from_slice(self.key.to_encoded_point(false).as_bytes());
        spki
    }

    /// Standard base64 of the SPKI DER, without line breaks.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_spki_der())
    }

    /// SHA-256 of the SPKI DER.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::digest(&self.to_spki_der())
    }

    /// Verify `signature` over `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`P256VerifyError::MalformedSignature`] when the bytes are not
    /// DER, and [`P256VerifyError::Mismatch`] when the signature was not made
    /// by this key over exactly these bytes.
    pub fn verify(&self, payload: &[u8], signature: &P256Signature) -> Result<(), P256VerifyError> {
        let ecdsa_sig = p256::ecdsa::DerSignature::from_bytes(signature.as_bytes())
            .map_err(|e| P256VerifyError::MalformedSignature(e.to_string()))?;
        self.key
            .verify(payload, &ecdsa_sig)
            .map_err(|_| P256VerifyError::Mismatch)
    }
}

impl PartialEq for P256PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_sec1_bytes() == other.to_sec1_bytes()
    }
}

impl Eq for P256PublicKey {}

impl From<p256::ecdsa::VerifyingKey> for P256PublicKey {
    fn from(key: p256::ecdsa::VerifyingKey) -> Self {
        Self { key }
    }
}

impl std::fmt::Display for P256PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for P256PublicKey {
    type Err = P256PublicKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl signature::Verifier<P256Signature> for P256PublicKey {
    fn verify(&self, msg: &[u8], signature: &P256Signature) -> Result<(), signature::Error> {
        P256PublicKey::verify(self, msg, signature).map_err(signature::Error::from_source)
    }
}

impl Serialize for P256PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for P256PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpkiVisitor;

        impl serde::de::Visitor<'_> for SpkiVisitor {
            type Value = P256PublicKey;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a base64 SPKI string containing a P-256 public key")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(SpkiVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{SigningKey, signature::Signer as _};

    fn fixture(seed: u8) -> (SigningKey, P256PublicKey) {
        let sk = SigningKey::from_bytes(&[seed; 32].into()).unwrap();
        let pk = P256PublicKey::from(*sk.verifying_key());
        (sk, pk)
    }

    fn sign(sk: &SigningKey, payload: &[u8]) -> P256Signature {
        let der: p256::ecdsa::DerSignature = sk.sign(payload);
        P256Signature::from_der(der.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn verify_valid_signature() {
        let (sk, pk) = fixture(42);
        let sig = sign(&sk, b"hello");
        pk.verify(b"hello", &sig).unwrap();
    }

    #[test]
    fn verify_via_trait() {
        let (sk, pk) = fixture(42);
        let sig = sign(&sk, b"trait-based verification");
        <P256PublicKey as signature::Verifier<P256Signature>>::verify(
            &pk,
            b"trait-based verification",
            &sig,
        )
        .unwrap();
    }

    #[test]
    fn verify_wrong_payload_fails() {
        let (sk, pk) = fixture(42);
        let sig = sign(&sk, b"hello");
        assert!(matches!(
            pk.verify(b"hello!", &sig),
            Err(P256VerifyError::Mismatch)
        ));
    }

    #[test]
    fn verify_wrong_key_fails() {
        let (sk, _) = fixture(42);
        let (_, other) = fixture(99);
        let sig = sign(&sk, b"key mismatch test");
        assert!(other.verify(b"key mismatch test", &sig).is_err());
    }

    #[test]
    fn verify_garbage_signature_is_malformed() {
        let (_, pk) = fixture(1);
        let sig = P256Signature::from_der(vec![1, 2, 3]).unwrap();
        assert!(matches!(
            pk.verify(b"payload", &sig),
            Err(P256VerifyError::MalformedSignature(_))
        ));
    }

    #[test]
    fn spki_starts_with_p256_header() {
        let (_, pk) = fixture(7);
        let spki = pk.to_spki_der();
        assert_eq!(spki.len(), 91);
        assert_eq!(spki[..26], P256_SPKI_HEADER);
        assert_eq!(spki[26], 0x04);
        assert_eq!(P256PublicKey::from_spki_der(&spki).unwrap(), pk);
    }

    #[test]
    fn base64_has_no_line_breaks() {
        let (_, pk) = fixture(7);
        let encoded = pk.to_base64();
        assert!(!encoded.contains('\n'));
        assert!(!encoded.contains('\r'));
        assert!(encoded.starts_with("MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE"));
    }

    #[test]
    fn base64_with_wrapped_lines_still_parses() {
        let (_, pk) = fixture(7);
        let encoded = pk.to_base64();
        let (head, tail) = encoded.split_at(64);
        let wrapped = format!("{head}\r\n{tail}");
        assert_eq!(wrapped.parse::<P256PublicKey>().unwrap(), pk);
    }

    #[test]
    fn spki_for_another_curve_is_rejected() {
        let (_, pk) = fixture(7);
        let mut spki = pk.to_spki_der();
        spki[21] = 0x22;
        assert!(matches!(
            P256PublicKey::from_spki_der(&spki),
            Err(P256PublicKeyError::InvalidSpki(_))
        ));
    }

    #[test]
    fn compressed_points_are_accepted() {
        let (sk, pk) = fixture(3);
        let compressed = sk.verifying_key().to_encoded_point(true);
        let restored = P256PublicKey::from_sec1_bytes(compressed.as_bytes()).unwrap();
        assert_eq!(restored, pk);
        assert_eq!(restored.to_sec1_bytes().len(), 65);
    }

    #[test]
    fn serde_roundtrip() {
        let (_, pk) = fixture(5);
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_base64()));
        let parsed: P256PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pk);
    }

    #[test]
    fn fingerprint_tracks_the_key() {
        let (_, a) = fixture(1);
        let (_, b) = fixture(2);
        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
