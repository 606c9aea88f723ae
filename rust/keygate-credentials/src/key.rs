//! Algorithm-agnostic key export types.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Private key material moved between a signer and the storage that seals it.
///
/// Only key store implementations should ever hold one of these; the value
/// never crosses the public boundary of `keygate`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum KeyExport {
    /// Raw scalar bytes. The key material is accessible.
    Extractable(Vec<u8>),
}

impl KeyExport {
    /// Borrow the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyExport::Extractable(bytes) => bytes,
        }
    }
}

impl From<&[u8; 32]> for KeyExport {
    fn from(seed: &[u8; 32]) -> Self {
        KeyExport::Extractable(seed.to_vec())
    }
}

impl From<Vec<u8>> for KeyExport {
    fn from(bytes: Vec<u8>) -> Self {
        KeyExport::Extractable(bytes)
    }
}

impl std::fmt::Debug for KeyExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyExport::Extractable(bytes) => f
                .debug_tuple("Extractable")
                .field(&format_args!("<{} redacted bytes>", bytes.len()))
                .finish(),
        }
    }
}
