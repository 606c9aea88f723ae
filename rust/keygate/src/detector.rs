//! Detects biometric enrollment changes per alias.
//!
//! When a key pair is created (and whenever its baseline is reset) the
//! detector records the enrollment fingerprint and the public key
//! fingerprint. A later check compares both against the live values.

use std::{fmt, str::FromStr, sync::Arc};

use keygate_common::Fingerprint;
use keygate_credentials::P256PublicKey;
use keygate_storage::StorageBackend;
use serde::{Deserialize, Serialize};

use crate::{
    alias::KeyAlias,
    error::KeyGateError,
    event::{KeyEvent, KeyEvents},
    keystore::{KeyStore, KeyStoreError},
    platform::BiometricPlatform,
};

/// Result of an enrollment change check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// The enrollment or the key differs from the baseline, or either is gone.
    Changed,
    /// Nothing changed since the baseline was recorded.
    Unchanged,
    /// The platform cannot tell.
    Unsupported,
}

impl ChangeStatus {
    /// The wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Changed => "changed",
            ChangeStatus::Unchanged => "unchanged",
            ChangeStatus::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "changed" => Ok(ChangeStatus::Changed),
            "unchanged" => Ok(ChangeStatus::Unchanged),
            "unsupported" | "sdk-unsupported" => Ok(ChangeStatus::Unsupported),
            other => Err(format!("unknown change status '{other}'")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Baseline {
    enrollment: Fingerprint,
    public_key: Fingerprint,
    recorded_at: u64,
}

/// Compares live enrollment and key state against recorded baselines.
pub struct ChangeDetector<K, P, B> {
    keystore: Arc<K>,
    platform: Arc<P>,
    baselines: B,
    events: KeyEvents,
}

impl<K, P, B> ChangeDetector<K, P, B>
where
    K: KeyStore,
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    /// Create a detector that keeps its baselines in `baselines`.
    pub fn new(keystore: Arc<K>, platform: Arc<P>, baselines: B, events: KeyEvents) -> Self {
        Self {
            keystore,
            platform,
            baselines,
            events,
        }
    }

    /// Record the current enrollment and `public_key` as the baseline of
    /// `alias`. Does nothing on platforms without enrollment reporting.
    pub async fn record(
        &self,
        alias: &KeyAlias,
        public_key: &P256PublicKey,
    ) -> Result<(), KeyGateError> {
        let Some(enrollment) = self.platform.enrollment() else {
            tracing::debug!(%alias, "Enrollment unavailable; no baseline recorded");
            return Ok(());
        };

        let baseline = Baseline {
            enrollment,
            public_key: public_key.fingerprint(),
            recorded_at: keygate_common::time::unix_millis(),
        };
        let bytes = serde_json::to_vec(&baseline)
            .map_err(|error| KeyGateError::Platform(error.to_string()))?;

        let mut baselines = self.baselines.clone();
        baselines
            .set(alias.storage_key(), bytes)
            .await
            .map_err(|error| KeyGateError::Storage(error.into()))
    }

    /// Whether the enrollment or the key under `alias` changed since the
    /// baseline was recorded.
    ///
    /// A missing key or a missing baseline both count as a change.
    pub async fn has_changed(&self, alias: &KeyAlias) -> Result<ChangeStatus, KeyGateError> {
        let Some(enrollment) = self.platform.enrollment() else {
            return Ok(ChangeStatus::Unsupported);
        };

        let Some(public_key) = self.current_key(alias).await? else {
            return Ok(ChangeStatus::Changed);
        };

        let Some(baseline) = self.baseline(alias).await? else {
            tracing::debug!(%alias, "No baseline recorded");
            return Ok(ChangeStatus::Changed);
        };

        if baseline.enrollment != enrollment || baseline.public_key != public_key.fingerprint() {
            tracing::info!(%alias, "Biometric enrollment changed");
            return Ok(ChangeStatus::Changed);
        }

        Ok(ChangeStatus::Unchanged)
    }

    /// Whether the key under `alias` is still `expected`.
    pub async fn has_changed_against(
        &self,
        alias: &KeyAlias,
        expected: &P256PublicKey,
    ) -> Result<ChangeStatus, KeyGateError> {
        Ok(match self.current_key(alias).await? {
            Some(public_key) if public_key == *expected => ChangeStatus::Unchanged,
            _ => ChangeStatus::Changed,
        })
    }

    /// Re-record the baseline of `alias` from the live enrollment and key.
    pub async fn reset(&self, alias: &KeyAlias) -> Result<(), KeyGateError> {
        let Some(public_key) = self.current_key(alias).await? else {
            return Err(KeyGateError::KeyNotFound(alias.clone()));
        };

        self.record(alias, &public_key).await?;
        self.events.emit(KeyEvent::BaselineReset {
            alias: alias.clone(),
        });
        Ok(())
    }

    /// Drop the baseline of `alias`.
    pub async fn forget(&self, alias: &KeyAlias) -> Result<(), KeyGateError> {
        let mut baselines = self.baselines.clone();
        baselines
            .delete(&alias.storage_key())
            .await
            .map_err(|error| KeyGateError::Storage(error.into()))?;
        Ok(())
    }

    async fn current_key(&self, alias: &KeyAlias) -> Result<Option<P256PublicKey>, KeyGateError> {
        match self.events.observe(self.keystore.public_key(alias).await) {
            Ok(public_key) => Ok(Some(public_key)),
            Err(KeyStoreError::NotFound(_) | KeyStoreError::Invalidated(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn baseline(&self, alias: &KeyAlias) -> Result<Option<Baseline>, KeyGateError> {
        let bytes = self
            .baselines
            .get(&alias.storage_key())
            .await
            .map_err(|error| KeyGateError::Storage(error.into()))?;

        match bytes {
            None => Ok(None),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(baseline) => Ok(Some(baseline)),
                Err(error) => {
                    tracing::warn!(%alias, %error, "Discarding unreadable baseline");
                    Ok(None)
                }
            },
        }
    }
}
