//! Persisted key-value storage
//!
//! The session manager keeps its durable record (token + user) behind the
//! [`KeyValueStore`] trait so the backend can be the OS keyring, a file, or
//! plain memory.
//!
//! # Example
//!
//! ```ignore
//! use academy_core::storage::{open_store, TOKEN_KEY};
//!
//! let store = open_store(&config.storage)?;
//! let token = store.get(TOKEN_KEY).await?;
//! ```

pub mod file;
pub mod keyring;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

/// Key of the bearer token entry; must stay stable across releases
pub const TOKEN_KEY: &str = "token";

/// Key of the serialized user entry; must stay stable across releases
pub const USER_KEY: &str = "user";

/// Async string key-value capability
///
/// Removing a key that does not exist is not an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    async fn remove(&self, key: &str) -> Result<()>;

    /// Delete several values, one after another
    ///
    /// Keeps going after a failure and reports the first error.
    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove(key).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Open the store named by the configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    debug!(backend = %config.backend, "Opening session store");
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Keyring => Arc::new(KeyringStore::new(&config.service)),
        StorageBackend::File => {
            let path = config
                .resolved_path()
                .map_err(|e| Error::Config(e.to_string()))?;
            Arc::new(FileStore::new(path))
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_many_clears_every_key() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "abc").await.unwrap();
        store.set(USER_KEY, "{}").await.unwrap();

        store.remove_many(&[TOKEN_KEY, USER_KEY]).await.unwrap();

        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
        assert!(store.get(USER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_memory_and_file_stores() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: Some(dir.path().join("session.json")),
            ..StorageConfig::default()
        };
        let store = open_store(&config).unwrap();
        store.set(TOKEN_KEY, "abc").await.unwrap();
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("abc"));

        let memory = open_store(&StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        })
        .unwrap();
        assert!(memory.get(TOKEN_KEY).await.unwrap().is_none());
    }
}
