use std::sync::Arc;

use keygate_credentials::{P256PublicKey, P256Signature};
use keygate_storage::StorageBackend;

use crate::{
    alias::KeyAlias,
    error::KeyGateError,
    event::KeyEvents,
    gate::{AuthorizationToken, BiometricGate},
    keystore::KeyStore,
    platform::BiometricPlatform,
};

/// Produces ES256 signatures behind the gate and checks them in the open.
pub struct SignatureEngine<K, P, B> {
    gate: Arc<BiometricGate<P, B>>,
    keystore: Arc<K>,
    events: KeyEvents,
}

impl<K, P, B> SignatureEngine<K, P, B>
where
    K: KeyStore,
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    /// Create an engine that redeems tokens with `gate` and signs with
    /// `keystore`.
    pub fn new(gate: Arc<BiometricGate<P, B>>, keystore: Arc<K>, events: KeyEvents) -> Self {
        Self {
            gate,
            keystore,
            events,
        }
    }

    /// Redeem `token` and sign `payload` with the private key under `alias`.
    ///
    /// Signatures are DER encoded ECDSA over the SHA-256 digest of the
    /// payload, with RFC 6979 deterministic nonces.
    pub async fn sign(
        &self,
        token: AuthorizationToken,
        alias: &KeyAlias,
        payload: &[u8],
    ) -> Result<P256Signature, KeyGateError> {
        let authorization = self.gate.redeem(token, alias)?;
        let signature = self
            .events
            .observe(self.keystore.sign(authorization, alias, payload).await)?;
        Ok(signature)
    }

    /// Whether `signature` was made over `payload` by the private half of
    /// `public_key`.
    pub fn verify(
        &self,
        public_key: &P256PublicKey,
        payload: &[u8],
        signature: &P256Signature,
    ) -> bool {
        verify_signature(public_key, payload, signature)
    }
}

/// Whether `signature` was made over `payload` by the private half of
/// `public_key`. Malformed signatures simply do not verify.
///
/// Verification needs no authentication and takes no locks.
pub fn verify_signature(
    public_key: &P256PublicKey,
    payload: &[u8],
    signature: &P256Signature,
) -> bool {
    match public_key.verify(payload, signature) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(%error, "Signature did not verify");
            false
        }
    }
}
