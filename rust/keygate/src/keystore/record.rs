use base64::{Engine, engine::general_purpose::STANDARD};
use keygate_common::Fingerprint;
use keygate_credentials::{P256PublicKey, P256Signer, key::KeyExport};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{KeyPolicy, KeyStoreError};
use crate::alias::KeyAlias;

const RECORD_VERSION: u32 = 1;

/// The persisted form of one key pair.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct KeyRecord {
    pub version: u32,
    pub alias: KeyAlias,
    secret_key: Zeroizing<String>,
    pub public_key: P256PublicKey,
    pub policy: KeyPolicy,
    pub enrollment: Option<Fingerprint>,
    pub created_at: u64,
}

impl KeyRecord {
    pub fn seal(
        alias: &KeyAlias,
        signer: &P256Signer,
        policy: KeyPolicy,
        enrollment: Option<Fingerprint>,
    ) -> Self {
        let export = signer.export();
        Self {
            version: RECORD_VERSION,
            alias: alias.clone(),
            secret_key: Zeroizing::new(STANDARD.encode(export.as_bytes())),
            public_key: *signer.public_key(),
            policy,
            enrollment,
            created_at: keygate_common::time::unix_millis(),
        }
    }

    pub fn unseal(&self) -> Result<P256Signer, KeyStoreError> {
        let secret = STANDARD
            .decode(self.secret_key.as_bytes())
            .map_err(|error| KeyStoreError::Corrupt(format!("secret key: {error}")))?;
        let signer = P256Signer::import(KeyExport::from(secret))
            .map_err(|error| KeyStoreError::Corrupt(error.to_string()))?;
        if signer.public_key() != &self.public_key {
            return Err(KeyStoreError::Corrupt(format!(
                "public key of '{}' does not match its secret",
                self.alias
            )));
        }
        Ok(signer)
    }

    /// Whether the enrollment this record is bound to is still current.
    pub fn is_bound_to(&self, current: Option<Fingerprint>) -> bool {
        !self.policy.invalidated_by_enrollment || self.enrollment == current
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, KeyStoreError> {
        serde_json::to_vec(self).map_err(|error| KeyStoreError::Corrupt(error.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyStoreError> {
        let record: Self = serde_json::from_slice(bytes)
            .map_err(|error| KeyStoreError::Corrupt(error.to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(KeyStoreError::Corrupt(format!(
                "unsupported record version {}",
                record.version
            )));
        }
        Ok(record)
    }
}
