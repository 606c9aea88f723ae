use std::sync::Arc;

use async_trait::async_trait;
use keygate_common::KeyedLock;
use keygate_credentials::{P256PublicKey, P256Signature, P256Signer};
use keygate_storage::StorageBackend;
use zeroize::Zeroizing;

use super::{KeyPolicy, KeyStore, KeyStoreError, record::KeyRecord};
use crate::{alias::KeyAlias, gate::Authorization, platform::BiometricPlatform};

/// A software enclave: P-256 key pairs sealed as JSON records in a
/// [`StorageBackend`].
///
/// Secret scalars are stored in the backend as-is, so the backend must be
/// trusted storage (an app-private directory, an encrypted volume, memory).
/// Enrollment-bound keys are checked against the platform's current
/// enrollment every time they are loaded and removed on mismatch.
pub struct SoftwareKeyStore<B, P> {
    backend: B,
    platform: Arc<P>,
    locks: KeyedLock<KeyAlias>,
}

impl<B, P> SoftwareKeyStore<B, P>
where
    B: StorageBackend<Key = String, Value = Vec<u8>>,
    P: BiometricPlatform,
{
    /// Create a key store over `backend` that binds keys to the enrollment
    /// reported by `platform`.
    pub fn new(backend: B, platform: Arc<P>) -> Self {
        Self {
            backend,
            platform,
            locks: KeyedLock::default(),
        }
    }

    async fn read(&self, alias: &KeyAlias) -> Result<Option<KeyRecord>, KeyStoreError> {
        let bytes = self
            .backend
            .get(&alias.storage_key())
            .await
            .map_err(|error| KeyStoreError::Storage(error.into()))?;
        bytes
            .map(|bytes| KeyRecord::from_bytes(&Zeroizing::new(bytes)))
            .transpose()
    }

    async fn write(&self, alias: &KeyAlias, record: &KeyRecord) -> Result<(), KeyStoreError> {
        let mut backend = self.backend.clone();
        backend
            .set(alias.storage_key(), record.to_bytes()?)
            .await
            .map_err(|error| KeyStoreError::Storage(error.into()))
    }

    async fn remove(&self, alias: &KeyAlias) -> Result<bool, KeyStoreError> {
        let mut backend = self.backend.clone();
        backend
            .delete(&alias.storage_key())
            .await
            .map_err(|error| KeyStoreError::Storage(error.into()))
    }

    /// Load a usable record. Must be called with the alias lock held.
    async fn load(&self, alias: &KeyAlias) -> Result<KeyRecord, KeyStoreError> {
        let Some(record) = self.read(alias).await? else {
            return Err(KeyStoreError::NotFound(alias.clone()));
        };

        if !record.is_bound_to(self.platform.enrollment()) {
            tracing::warn!(%alias, "Enrollment changed; removing bound key pair");
            self.remove(alias).await?;
            return Err(KeyStoreError::Invalidated(alias.clone()));
        }

        Ok(record)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<B, P> KeyStore for SoftwareKeyStore<B, P>
where
    B: StorageBackend<Key = String, Value = Vec<u8>>,
    P: BiometricPlatform,
{
    async fn create_key_pair(
        &self,
        alias: &KeyAlias,
        policy: KeyPolicy,
    ) -> Result<P256PublicKey, KeyStoreError> {
        let _guard = self.locks.lock(alias.clone()).await;

        let enrollment = self.platform.enrollment();
        if policy.invalidated_by_enrollment && enrollment.is_none() {
            return Err(KeyStoreError::PolicyUnsupported(
                "the platform does not report biometric enrollment".into(),
            ));
        }

        if !policy.overwrite {
            match self.load(alias).await {
                Ok(_) => return Err(KeyStoreError::AliasInUse(alias.clone())),
                Err(KeyStoreError::NotFound(_) | KeyStoreError::Invalidated(_)) => (),
                Err(error) => return Err(error),
            }
        }

        let signer = P256Signer::generate().map_err(|error| KeyStoreError::Crypto(error.to_string()))?;
        let record = KeyRecord::seal(alias, &signer, policy, enrollment);
        self.write(alias, &record).await?;

        tracing::info!(%alias, bound = policy.invalidated_by_enrollment, "Created key pair");
        Ok(record.public_key)
    }

    async fn public_key(&self, alias: &KeyAlias) -> Result<P256PublicKey, KeyStoreError> {
        // Writes replace records atomically, so a current record can be read
        // without the alias lock. Removing a stale one needs it.
        match self.read(alias).await? {
            None => Err(KeyStoreError::NotFound(alias.clone())),
            Some(record) if record.is_bound_to(self.platform.enrollment()) => {
                Ok(record.public_key)
            }
            Some(_) => {
                let _guard = self.locks.lock(alias.clone()).await;
                Ok(self.load(alias).await?.public_key)
            }
        }
    }

    async fn delete_key_pair(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        let _guard = self.locks.lock(alias.clone()).await;
        if !self.remove(alias).await? {
            return Err(KeyStoreError::NotFound(alias.clone()));
        }
        tracing::info!(%alias, "Deleted key pair");
        Ok(())
    }

    async fn sign(
        &self,
        authorization: Authorization,
        alias: &KeyAlias,
        payload: &[u8],
    ) -> Result<P256Signature, KeyStoreError> {
        if authorization.alias() != alias {
            return Err(KeyStoreError::Unauthorized(format!(
                "authorization covers '{}', not '{}'",
                authorization.alias(),
                alias
            )));
        }

        let _guard = self.locks.lock(alias.clone()).await;
        let signer = self.load(alias).await?.unseal()?;
        let signature = signer
            .sign(payload)
            .map_err(|error| KeyStoreError::Crypto(error.to_string()))?;

        tracing::debug!(%alias, "Signed payload");
        Ok(signature)
    }

    async fn invalidate(&self, alias: &KeyAlias) -> Result<bool, KeyStoreError> {
        let _guard = self.locks.lock(alias.clone()).await;
        let removed = self.remove(alias).await?;
        if removed {
            tracing::info!(%alias, "Invalidated key pair");
        }
        Ok(removed)
    }
}
