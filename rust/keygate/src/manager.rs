use std::sync::Arc;

use keygate_credentials::{P256PublicKey, P256Signature};
use keygate_storage::{MemoryStorageBackend, StorageBackend};
use tokio::sync::broadcast;

use crate::{
    alias::KeyAlias,
    config::KeyGateConfig,
    detector::{ChangeDetector, ChangeStatus},
    engine::SignatureEngine,
    error::KeyGateError,
    event::{KeyEvent, KeyEvents},
    gate::{BiometricGate, GateState},
    keystore::{KeyPolicy, KeyStore, KeyStoreError, SoftwareKeyStore},
    platform::BiometricPlatform,
    prompt::PromptConfig,
};

/// The storage backend used by [`KeyGate::in_memory`].
pub type MemoryBackend = MemoryStorageBackend<String, Vec<u8>>;

/// The storage backend used by [`KeyGate::open`].
#[cfg(not(target_arch = "wasm32"))]
pub type FileSystemBackend = keygate_storage::FileSystemStorageBackend<String, Vec<u8>>;

/// Biometric-gated key management for an application.
///
/// `KeyGate` ties a [`KeyStore`], a [`BiometricGate`], a [`SignatureEngine`]
/// and a [`ChangeDetector`] together behind the operations an application
/// calls: create a key pair, sign, verify, and check whether the biometric
/// enrollment changed.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), keygate::KeyGateError> {
/// use keygate::{KeyAlias, KeyGate, KeyGateConfig, PromptConfig, SimulatedPlatform};
///
/// let keygate = KeyGate::in_memory(KeyGateConfig::default(), SimulatedPlatform::default());
/// let alias = KeyAlias::new("user-42")?;
/// let prompt = PromptConfig::titled("Confirm");
///
/// keygate.create_key_pair(&alias, &prompt).await?;
/// let signature = keygate.sign(&alias, b"hello", &prompt).await?;
/// assert!(keygate.verify(&alias, b"hello", &signature, None).await?);
/// # Ok(())
/// # }
/// ```
pub struct KeyGate<K, P, B> {
    config: KeyGateConfig,
    platform: Arc<P>,
    gate: Arc<BiometricGate<P, B>>,
    keystore: Arc<K>,
    engine: SignatureEngine<K, P, B>,
    detector: ChangeDetector<K, P, B>,
    events: KeyEvents,
}

impl<P> KeyGate<SoftwareKeyStore<MemoryBackend, P>, P, MemoryBackend>
where
    P: BiometricPlatform,
{
    /// A key gate whose keys live only as long as the process.
    pub fn in_memory(config: KeyGateConfig, platform: P) -> Self {
        let platform = Arc::new(platform);
        let keystore = SoftwareKeyStore::new(MemoryBackend::default(), platform.clone());
        Self::new(
            config,
            platform,
            keystore,
            MemoryBackend::default(),
            MemoryBackend::default(),
        )
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<P> KeyGate<SoftwareKeyStore<FileSystemBackend, P>, P, FileSystemBackend>
where
    P: BiometricPlatform,
{
    /// A key gate persisted under `directory`.
    ///
    /// Key records go to `keys/`, change baselines to `baselines/` and
    /// failure counts and lockouts to `lockouts/`.
    pub async fn open(
        config: KeyGateConfig,
        platform: P,
        directory: impl AsRef<std::path::Path>,
    ) -> Result<Self, KeyGateError> {
        let directory = directory.as_ref();
        let keys = FileSystemBackend::new(directory.join("keys")).await?;
        let baselines = FileSystemBackend::new(directory.join("baselines")).await?;
        let lockouts = FileSystemBackend::new(directory.join("lockouts")).await?;

        let platform = Arc::new(platform);
        let keystore = SoftwareKeyStore::new(keys, platform.clone());
        Ok(Self::new(config, platform, keystore, baselines, lockouts))
    }
}

impl<K, P, B> KeyGate<K, P, B>
where
    K: KeyStore,
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    /// Assemble a key gate from its parts.
    ///
    /// Change baselines are kept in `baselines` and the gate's lockout state
    /// in `lockouts`.
    pub fn new(
        config: KeyGateConfig,
        platform: Arc<P>,
        keystore: K,
        baselines: B,
        lockouts: B,
    ) -> Self {
        let events = KeyEvents::default();
        let keystore = Arc::new(keystore);
        let gate = Arc::new(BiometricGate::new(platform.clone(), config.gate, lockouts));
        let engine = SignatureEngine::new(gate.clone(), keystore.clone(), events.clone());
        let detector =
            ChangeDetector::new(keystore.clone(), platform.clone(), baselines, events.clone());

        Self {
            config,
            platform,
            gate,
            keystore,
            engine,
            detector,
            events,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &KeyGateConfig {
        &self.config
    }

    /// The platform prompts are shown on.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Receive [`KeyEvent`]s published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        self.events.subscribe()
    }

    /// The gate state of `alias`.
    pub async fn gate_state(&self, alias: &KeyAlias) -> Result<GateState, KeyGateError> {
        Ok(self.gate.state(alias).await?)
    }

    /// Authenticate, then generate a key pair under `alias`.
    ///
    /// The key is bound to the current biometric enrollment when
    /// `prompt.invalidated_by_biometric_enrollment` is set. Unless the key
    /// store is configured to overwrite, an alias in use fails with
    /// [`KeyGateError::AliasInUse`] before any prompt is shown.
    ///
    /// If the baseline cannot be recorded the new key pair is deleted again,
    /// so a failed call leaves the alias free.
    pub async fn create_key_pair(
        &self,
        alias: &KeyAlias,
        prompt: &PromptConfig,
    ) -> Result<P256PublicKey, KeyGateError> {
        let policy = KeyPolicy {
            invalidated_by_enrollment: prompt.invalidated_by_biometric_enrollment,
            overwrite: self.config.keystore.overwrite,
        };

        if policy.invalidated_by_enrollment && self.platform.enrollment().is_none() {
            return Err(KeyGateError::PolicyUnsupported(
                "the platform does not report biometric enrollment".into(),
            ));
        }

        if !policy.overwrite && self.lookup(alias).await?.is_some() {
            return Err(KeyGateError::AliasInUse(alias.clone()));
        }

        let token = self.gate.authorize(alias, prompt).await?;
        self.gate.redeem(token, alias)?;

        let public_key = self.keystore.create_key_pair(alias, policy).await?;
        if let Err(error) = self.detector.record(alias, &public_key).await {
            tracing::warn!(%alias, %error, "Failed to record baseline; removing new key pair");
            if let Err(rollback) = self.keystore.delete_key_pair(alias).await {
                tracing::warn!(%alias, error = %rollback, "Failed to remove new key pair");
            }
            return Err(error);
        }
        self.events.emit(KeyEvent::Created {
            alias: alias.clone(),
            public_key,
        });
        Ok(public_key)
    }

    /// Authenticate, then sign `payload` with the key under `alias`.
    pub async fn sign(
        &self,
        alias: &KeyAlias,
        payload: &[u8],
        prompt: &PromptConfig,
    ) -> Result<P256Signature, KeyGateError> {
        self.public_key(alias).await?;
        let token = self.gate.authorize(alias, prompt).await?;
        self.engine.sign(token, alias, payload).await
    }

    /// Check `signature` over `payload` against the key under `alias`.
    ///
    /// With a `prompt` the user must authenticate first; without one the
    /// check is unauthenticated, like [`KeyGate::verify_with_public_key`].
    pub async fn verify(
        &self,
        alias: &KeyAlias,
        payload: &[u8],
        signature: &P256Signature,
        prompt: Option<&PromptConfig>,
    ) -> Result<bool, KeyGateError> {
        let public_key = self.public_key(alias).await?;
        if let Some(prompt) = prompt {
            let token = self.gate.authorize(alias, prompt).await?;
            self.gate.redeem(token, alias)?;
        }
        Ok(self.engine.verify(&public_key, payload, signature))
    }

    /// Check `signature` over `payload` against a caller-held public key.
    pub fn verify_with_public_key(
        &self,
        public_key: &P256PublicKey,
        payload: &[u8],
        signature: &P256Signature,
    ) -> bool {
        self.engine.verify(public_key, payload, signature)
    }

    /// The public key under `alias`.
    pub async fn public_key(&self, alias: &KeyAlias) -> Result<P256PublicKey, KeyGateError> {
        self.lookup(alias)
            .await?
            .ok_or_else(|| KeyGateError::KeyNotFound(alias.clone()))
    }

    /// Delete the key pair under `alias` along with its change baseline.
    pub async fn delete_key_pair(&self, alias: &KeyAlias) -> Result<(), KeyGateError> {
        self.keystore.delete_key_pair(alias).await?;
        self.detector.forget(alias).await?;
        self.gate.forget(alias);
        self.events.emit(KeyEvent::Deleted {
            alias: alias.clone(),
        });
        Ok(())
    }

    /// Whether the biometric enrollment or the key under `alias` changed
    /// since the key was created or the baseline last reset.
    pub async fn is_biometric_changed(
        &self,
        alias: &KeyAlias,
    ) -> Result<ChangeStatus, KeyGateError> {
        self.detector.has_changed(alias).await
    }

    /// Whether the key under `alias` is no longer `public_key`.
    pub async fn is_biometric_changed_against(
        &self,
        alias: &KeyAlias,
        public_key: &P256PublicKey,
    ) -> Result<ChangeStatus, KeyGateError> {
        self.detector.has_changed_against(alias, public_key).await
    }

    /// Accept the current enrollment as the new baseline for `alias`.
    pub async fn reset_biometric_changed(&self, alias: &KeyAlias) -> Result<(), KeyGateError> {
        self.detector.reset(alias).await
    }

    /// Clear lockouts on `alias` by authenticating with the device
    /// credential.
    pub async fn recover_with_device_credential(
        &self,
        alias: &KeyAlias,
        prompt: &PromptConfig,
    ) -> Result<(), KeyGateError> {
        Ok(self.gate.recover_with_device_credential(alias, prompt).await?)
    }

    async fn lookup(&self, alias: &KeyAlias) -> Result<Option<P256PublicKey>, KeyGateError> {
        match self.events.observe(self.keystore.public_key(alias).await) {
            Ok(public_key) => Ok(Some(public_key)),
            Err(KeyStoreError::NotFound(_) | KeyStoreError::Invalidated(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}
