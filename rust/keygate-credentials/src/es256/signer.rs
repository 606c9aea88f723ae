//! ES256 signer implementation.

use super::{der::P256Signature, error::P256KeyError, verifier::P256PublicKey};
use crate::key::KeyExport;
use p256::ecdsa::{DerSignature, SigningKey, signature::Signer as _};
use zeroize::{Zeroize, Zeroizing};

/// How many fresh seeds to draw before giving up on finding a valid scalar.
/// A uniformly random 32-byte string is out of range with probability
/// around 2^-32, so the bound is never reached in practice.
const MAX_GENERATE_ATTEMPTS: usize = 8;

/// A P-256 signing key together with its public half.
///
/// Signing hashes the payload with SHA-256 and uses RFC 6979 deterministic
/// nonces, so signing the same payload twice yields the same signature.
#[derive(Clone)]
pub struct P256Signer {
    public_key: P256PublicKey,
    signing_key: SigningKey,
}

impl From<SigningKey> for P256Signer {
    fn from(signing_key: SigningKey) -> Self {
        let public_key = P256PublicKey::from(*signing_key.verifying_key());
        Self {
            public_key,
            signing_key,
        }
    }
}

impl P256Signer {
    /// Generate a new key pair from operating-system randomness.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn generate() -> Result<Self, P256KeyError> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mut seed = Zeroizing::new([0u8; 32]);
            getrandom::getrandom(seed.as_mut_slice())?;
            if let Ok(signing_key) = SigningKey::from_slice(seed.as_slice()) {
                return Ok(signing_key.into());
            }
        }
        Err(P256KeyError::InvalidSecretKey)
    }

    /// Import a key pair from a [`KeyExport`].
    ///
    /// Accepts anything that converts `Into<KeyExport>`, including `&[u8; 32]`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the bytes are exactly one valid 32-byte P-256
    /// scalar.
    pub fn import(key: impl Into<KeyExport>) -> Result<Self, P256KeyError> {
        let key = key.into();
        if key.as_bytes().len() != 32 {
            return Err(P256KeyError::InvalidSecretKey);
        }
        let signing_key =
            SigningKey::from_slice(key.as_bytes()).map_err(|_| P256KeyError::InvalidSecretKey)?;
        Ok(signing_key.into())
    }

    /// Export the secret scalar.
    #[must_use]
    pub fn export(&self) -> KeyExport {
        let mut scalar = self.signing_key.to_bytes();
        let export = KeyExport::Extractable(scalar.as_slice().to_vec());
        scalar.as_mut_slice().zeroize();
        export
    }

    /// Get the public half of this key pair.
    #[must_use]
    pub const fn public_key(&self) -> &P256PublicKey {
        &self.public_key
    }

    /// Sign `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ECDSA implementation rejects the operation.
    pub fn sign(&self, payload: &[u8]) -> Result<P256Signature, P256KeyError> {
        let der: DerSignature = self
            .signing_key
            .try_sign(payload)
            .map_err(|e| P256KeyError::Signing(e.to_string()))?;
        P256Signature::from_der(der.as_bytes().to_vec())
            .map_err(|e| P256KeyError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for P256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P256Signer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for P256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.public_key)
    }
}

impl signature::Signer<P256Signature> for P256Signer {
    fn try_sign(&self, msg: &[u8]) -> Result<P256Signature, signature::Error> {
        self.sign(msg).map_err(signature::Error::from_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn test_signer(seed: u8) -> P256Signer {
        P256Signer::import(&[seed; 32]).unwrap()
    }

    #[test]
    fn generated_keys_sign_and_verify() -> TestResult {
        let signer = P256Signer::generate()?;
        let signature = signer.sign(b"hello")?;
        signer.public_key().verify(b"hello", &signature)?;
        Ok(())
    }

    #[test]
    fn generated_keys_are_distinct() -> TestResult {
        let first = P256Signer::generate()?;
        let second = P256Signer::generate()?;
        assert_ne!(first.public_key(), second.public_key());
        Ok(())
    }

    #[test]
    fn export_import_preserves_the_key() -> TestResult {
        let signer = test_signer(42);
        let restored = P256Signer::import(signer.export())?;
        assert_eq!(restored.public_key(), signer.public_key());
        Ok(())
    }

    #[test]
    fn signatures_are_deterministic() -> TestResult {
        let signer = test_signer(9);
        assert_eq!(signer.sign(b"same payload")?, signer.sign(b"same payload")?);
        Ok(())
    }

    #[test]
    fn different_messages_produce_different_signatures() -> TestResult {
        let signer = test_signer(7);
        assert_ne!(signer.sign(b"first message")?, signer.sign(b"second message")?);
        Ok(())
    }

    #[test]
    fn zero_scalar_is_rejected() {
        assert!(matches!(
            P256Signer::import(&[0u8; 32]),
            Err(P256KeyError::InvalidSecretKey)
        ));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(P256Signer::import(vec![1u8; 31]).is_err());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let signer = test_signer(42);
        let rendered = format!("{signer:?}");
        assert!(rendered.starts_with("P256Signer"));
        assert!(rendered.contains(".."));
    }

    #[test]
    fn signer_trait_matches_inherent_sign() -> TestResult {
        let signer = test_signer(3);
        let via_trait = <P256Signer as signature::Signer<P256Signature>>::try_sign(&signer, b"x")?;
        assert_eq!(via_trait, signer.sign(b"x")?);
        Ok(())
    }
}
