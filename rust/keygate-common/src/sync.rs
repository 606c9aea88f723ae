//! Cross-target bound compatibility traits and keyed locking
//!
//! The `Conditional*` traits support writing async code that may target both
//! `wasm32-unknown-unknown` as well as native targets where it may be the case
//! that an implementer will be shared across threads.
//!
//! On `wasm32-unknown-unknown` targets, the traits effectively represent no
//! new bound. But, on other targets they represent `Send` or `Send + Sync`
//! bounds (depending on which one is used).

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[allow(missing_docs)]
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSend for S where S: Send {}

#[allow(missing_docs)]
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSync for S where S: Send + Sync {}

#[allow(missing_docs)]
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSend {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSend for S {}

#[allow(missing_docs)]
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSync {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSync for S {}

/// A set of async mutexes addressed by key.
///
/// Holding the guard returned by [`KeyedLock::lock`] serializes every other
/// caller that locks the same key, while callers on different keys proceed
/// independently. Entries are dropped once no guard or waiter references them.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use keygate_common::KeyedLock;
///
/// let locks = KeyedLock::default();
/// let guard = locks.lock("user-42".to_string()).await;
/// assert!(locks.try_lock("user-42".to_string()).is_none());
/// assert!(locks.try_lock("user-7".to_string()).is_some());
/// drop(guard);
/// assert!(locks.try_lock("user-42".to_string()).is_some());
/// # }
/// ```
#[derive(Debug)]
pub struct KeyedLock<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLock<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    /// Wait until the lock for `key` is available and acquire it.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = self.slot(key);
        slot.lock_owned().await
    }

    /// Acquire the lock for `key` if nobody currently holds it.
    pub fn try_lock(&self, key: K) -> Option<OwnedMutexGuard<()>> {
        self.slot(key).try_lock_owned().ok()
    }

    fn slot(&self, key: K) -> Arc<AsyncMutex<()>> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map itself references idle slots
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.entry(key).or_default().clone()
    }
}
