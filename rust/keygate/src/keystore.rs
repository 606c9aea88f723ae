//! Key pair storage and the private-key operation.
//!
//! A [`KeyStore`] owns key material. It hands out public keys freely but only
//! signs with a redeemed [`Authorization`] from the biometric gate, so an
//! unauthenticated caller has no path to the private half.

use async_trait::async_trait;
use keygate_common::ConditionalSync;
use keygate_credentials::{P256PublicKey, P256Signature};
use keygate_storage::KeyGateStorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{alias::KeyAlias, gate::Authorization};

mod record;

mod software;
pub use software::*;

/// Errors produced by a [`KeyStore`].
#[derive(Debug, Clone, Error)]
pub enum KeyStoreError {
    /// A key pair already exists under the alias.
    #[error("alias '{0}' is in use")]
    AliasInUse(KeyAlias),
    /// No key pair exists under the alias.
    #[error("no key pair under '{0}'")]
    NotFound(KeyAlias),
    /// The key pair was removed because the biometric enrollment changed.
    #[error("key pair '{0}' was invalidated by an enrollment change")]
    Invalidated(KeyAlias),
    /// The authorization does not cover the requested operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The policy cannot be enforced on this platform.
    #[error("policy unsupported: {0}")]
    PolicyUnsupported(String),
    /// A stored record could not be decoded.
    #[error("corrupt key record: {0}")]
    Corrupt(String),
    /// Key generation or signing failed.
    #[error("crypto failure: {0}")]
    Crypto(String),
    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] KeyGateStorageError),
}

/// How a key pair behaves over its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyPolicy {
    /// Remove the key pair once the biometric enrollment set changes.
    pub invalidated_by_enrollment: bool,
    /// Replace an existing key pair under the same alias instead of failing.
    pub overwrite: bool,
}

/// Storage for P-256 key pairs addressed by alias.
///
/// Mutations on one alias are serialized; operations on different aliases
/// run independently.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait KeyStore: ConditionalSync {
    /// Generate a key pair under `alias` and return its public half.
    async fn create_key_pair(
        &self,
        alias: &KeyAlias,
        policy: KeyPolicy,
    ) -> Result<P256PublicKey, KeyStoreError>;

    /// The public half of the key pair under `alias`.
    async fn public_key(&self, alias: &KeyAlias) -> Result<P256PublicKey, KeyStoreError>;

    /// Remove the key pair under `alias`.
    async fn delete_key_pair(&self, alias: &KeyAlias) -> Result<(), KeyStoreError>;

    /// Sign `payload` with the private half of the key pair under `alias`.
    async fn sign(
        &self,
        authorization: Authorization,
        alias: &KeyAlias,
        payload: &[u8],
    ) -> Result<P256Signature, KeyStoreError>;

    /// Remove the key pair under `alias` because the enrollment it was bound
    /// to is gone. Returns whether there was a key pair to remove.
    async fn invalidate(&self, alias: &KeyAlias) -> Result<bool, KeyStoreError>;
}
