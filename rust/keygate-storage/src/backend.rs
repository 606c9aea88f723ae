use async_trait::async_trait;
use keygate_common::{ConditionalSend, ConditionalSync};

use crate::KeyGateStorageError;

mod memory;
pub use memory::*;

#[cfg(not(target_arch = "wasm32"))]
mod fs;
#[cfg(not(target_arch = "wasm32"))]
pub use fs::*;

/// Somewhere to keep sealed key records and change baselines.
///
/// Writes take `&mut self`; implementations are expected to be cheap to clone
/// and to share state between clones.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait StorageBackend: Clone + ConditionalSync {
    /// The key type used by this [StorageBackend]
    type Key: ConditionalSync;
    /// The value type able to be stored by this [StorageBackend]
    type Value: ConditionalSend;
    /// The error type produced by this [StorageBackend]
    type Error: Into<KeyGateStorageError>;

    /// Store the given value against the given key, replacing any prior value
    async fn set(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error>;
    /// Retrieve a value (if any) stored against the given key
    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error>;
    /// Remove the value stored against the given key, reporting whether there
    /// was one
    async fn delete(&mut self, key: &Self::Key) -> Result<bool, Self::Error>;
}
