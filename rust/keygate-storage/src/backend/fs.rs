use crate::KeyGateStorageError;
use async_trait::async_trait;
use base58::ToBase58;
use keygate_common::ConditionalSync;
use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use super::StorageBackend;

/// Longest encoded file name, leaving room for the staging extension within
/// the common 255-byte limit.
const MAX_FILE_NAME_LEN: usize = 255 - ".tmp".len();

/// A basic file-system-based [StorageBackend] implementation. All values are
/// stored inside a root directory as files named after their (base58-encoded)
/// keys.
///
/// Writes go to a temporary sibling file first and are then renamed into
/// place, so a reader never observes a partially written value.
#[derive(Clone)]
pub struct FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone,
    Value: AsRef<[u8]> + From<Vec<u8>> + Clone,
{
    root_dir: PathBuf,
    key_type: PhantomData<Key>,
    value_type: PhantomData<Value>,
}

impl<Key, Value> FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone,
    Value: AsRef<[u8]> + From<Vec<u8>> + Clone,
{
    /// Creates a new [`FileSystemStorageBackend`] that stores files in
    /// `root_dir`.
    pub async fn new<Pathlike>(root_dir: Pathlike) -> Result<Self, KeyGateStorageError>
    where
        Pathlike: AsRef<Path>,
    {
        let root_dir = root_dir.as_ref().to_owned();
        tokio::fs::create_dir_all(&root_dir).await?;
        Ok(Self {
            root_dir,
            key_type: PhantomData,
            value_type: PhantomData,
        })
    }

    /// The directory values are stored in.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn make_path(&self, key: &Key) -> Result<PathBuf, KeyGateStorageError> {
        let encoded = key.as_ref().to_base58();
        if encoded.is_empty() {
            return Err(KeyGateStorageError::InvalidKey("empty key".into()));
        }
        if encoded.len() > MAX_FILE_NAME_LEN {
            return Err(KeyGateStorageError::InvalidKey(format!(
                "key encodes to a {}-byte file name",
                encoded.len()
            )));
        }
        Ok(self.root_dir.join(encoded))
    }
}

#[async_trait]
impl<Key, Value> StorageBackend for FileSystemStorageBackend<Key, Value>
where
    Key: AsRef<[u8]> + Clone + ConditionalSync,
    Value: AsRef<[u8]> + Clone + From<Vec<u8>> + ConditionalSync,
{
    type Key = Key;
    type Value = Value;
    type Error = KeyGateStorageError;

    async fn set(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error> {
        let path = self.make_path(&key)?;
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, value).await?;
        if let Err(error) = tokio::fs::rename(&staging, &path).await {
            tracing::warn!(path = %path.display(), %error, "Failed to move staged value into place");
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }
        Ok(())
    }

    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error> {
        let path = self.make_path(key)?;
        match tokio::fs::read(path).await {
            Ok(value) => Ok(Some(Value::from(value))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&mut self, key: &Self::Key) -> Result<bool, Self::Error> {
        let path = self.make_path(key)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn it_names_files_after_base58_keys() -> Result<()> {
        let tempdir = tempfile::tempdir()?;
        let mut backend =
            FileSystemStorageBackend::<String, Vec<u8>>::new(tempdir.path()).await?;

        backend.set("user-42".into(), b"record".to_vec()).await?;

        let expected = tempdir.path().join(b"user-42".to_base58());
        assert_eq!(tokio::fs::read(expected).await?, b"record".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn it_persists_across_instances() -> Result<()> {
        let tempdir = tempfile::tempdir()?;
        let mut first = FileSystemStorageBackend::<String, Vec<u8>>::new(tempdir.path()).await?;
        first.set("alias".into(), vec![1, 2]).await?;

        let second = FileSystemStorageBackend::<String, Vec<u8>>::new(tempdir.path()).await?;
        assert_eq!(second.get(&"alias".to_string()).await?, Some(vec![1, 2]));
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_empty_keys() -> Result<()> {
        let tempdir = tempfile::tempdir()?;
        let backend = FileSystemStorageBackend::<String, Vec<u8>>::new(tempdir.path()).await?;
        assert!(matches!(
            backend.get(&String::new()).await,
            Err(KeyGateStorageError::InvalidKey(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_keys_too_long_for_a_file_name() -> Result<()> {
        let tempdir = tempfile::tempdir()?;
        let mut backend =
            FileSystemStorageBackend::<String, Vec<u8>>::new(tempdir.path()).await?;

        let long = "k".repeat(200);
        assert!(matches!(
            backend.set(long.clone(), vec![1]).await,
            Err(KeyGateStorageError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.get(&long).await,
            Err(KeyGateStorageError::InvalidKey(_))
        ));

        let longest_alias = "k".repeat(128);
        backend.set(longest_alias.clone(), vec![2]).await?;
        assert_eq!(backend.get(&longest_alias).await?, Some(vec![2]));
        Ok(())
    }
}
