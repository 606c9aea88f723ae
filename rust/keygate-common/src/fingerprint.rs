use std::{array::TryFromSliceError, fmt};

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// The size of a [`Fingerprint`] in bytes.
pub const FINGERPRINT_SIZE: usize = 32;

/// A SHA-256 digest used to compare opaque state without retaining it.
///
/// Fingerprints identify things like an enrolled biometric set or a public
/// key when only equality matters. They serialize as standard base64.
///
/// # Examples
///
/// ```rust
/// use keygate_common::Fingerprint;
///
/// let a = Fingerprint::digest(b"left thumb");
/// let b = Fingerprint::digest_iter([b"left ".as_slice(), b"thumb".as_slice()].into_iter());
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Computes the SHA-256 digest of the given bytes.
    pub fn digest(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Computes the SHA-256 digest of a sequence of chunks, as if they were
    /// concatenated.
    pub fn digest_iter<'a, I>(chunks: I) -> Self
    where
        I: Iterator<Item = &'a [u8]>,
    {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Self(hasher.finalize().into())
    }

    /// The raw digest bytes.
    pub fn bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }
}

impl From<[u8; FINGERPRINT_SIZE]> for Fingerprint {
    fn from(value: [u8; FINGERPRINT_SIZE]) -> Self {
        Fingerprint(value)
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Fingerprint(value.try_into()?))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD.encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Fingerprint::try_from(bytes.as_slice()).map_err(|_| {
            serde::de::Error::custom(format!(
                "expected {FINGERPRINT_SIZE} fingerprint bytes, got {}",
                bytes.len()
            ))
        })
    }
}
