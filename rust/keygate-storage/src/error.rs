use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyGateStorageError {
    /// An error that occurs when working with a storage backend
    #[error("Storage backend error: {0}")]
    StorageBackend(String),

    /// A key that can not be mapped onto the backend's namespace
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for KeyGateStorageError {
    fn from(error: std::io::Error) -> Self {
        KeyGateStorageError::StorageBackend(format!("{error}"))
    }
}
