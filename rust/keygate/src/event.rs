use keygate_credentials::P256PublicKey;
use tokio::sync::broadcast;

use crate::{alias::KeyAlias, keystore::KeyStoreError};

const EVENT_CAPACITY: usize = 64;

/// A change to the set of key pairs, published so that holders of cached
/// public keys know when to drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// A key pair was created (or replaced) under the alias.
    Created {
        /// The alias.
        alias: KeyAlias,
        /// Its new public key.
        public_key: P256PublicKey,
    },
    /// The key pair under the alias was deleted.
    Deleted {
        /// The alias.
        alias: KeyAlias,
    },
    /// The key pair under the alias was removed after an enrollment change.
    Invalidated {
        /// The alias.
        alias: KeyAlias,
    },
    /// The change baseline of the alias was re-recorded.
    BaselineReset {
        /// The alias.
        alias: KeyAlias,
    },
}

/// A cloneable publisher of [`KeyEvent`]s.
#[derive(Debug, Clone)]
pub struct KeyEvents {
    sender: broadcast::Sender<KeyEvent>,
}

impl Default for KeyEvents {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

impl KeyEvents {
    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: KeyEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Publish [`KeyEvent::Invalidated`] if `result` reports an invalidation.
    pub(crate) fn observe<T>(
        &self,
        result: Result<T, KeyStoreError>,
    ) -> Result<T, KeyStoreError> {
        if let Err(KeyStoreError::Invalidated(alias)) = &result {
            self.emit(KeyEvent::Invalidated {
                alias: alias.clone(),
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidations_are_published() {
        let events = KeyEvents::default();
        let mut receiver = events.subscribe();
        let alias = KeyAlias::new("user-42").unwrap();

        let _ = events.observe::<()>(Err(KeyStoreError::NotFound(alias.clone())));
        let _ = events.observe::<()>(Err(KeyStoreError::Invalidated(alias.clone())));

        assert_eq!(receiver.recv().await.unwrap(), KeyEvent::Invalidated { alias });
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        KeyEvents::default().emit(KeyEvent::Deleted {
            alias: KeyAlias::new("user-42").unwrap(),
        });
    }
}
