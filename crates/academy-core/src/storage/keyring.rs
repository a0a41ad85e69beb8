//! OS keyring integration for the persisted session
//!
//! Each key becomes its own credential entry under one service name
//! (macOS Keychain, Windows Credential Manager, Linux Secret Service).

use async_trait::async_trait;
use keyring::Entry;

use crate::error::{Error, Result};

use super::KeyValueStore;

/// OS keyring-backed key-value store
///
/// Access to the keyring may require user authentication depending on OS
/// configuration. Keyring calls block, so they run on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store whose entries live under `service`
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key)
            .map_err(|e| Error::Storage(format!("Failed to open keyring entry '{}': {}", key, e)))
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry(key)?;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read '{}': {}", key, e))),
        })
        .await
        .map_err(|e| Error::Storage(format!("Task join error: {}", e)))?
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key)?;
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            entry
                .set_password(&value)
                .map_err(|e| Error::Storage(format!("Failed to write '{}': {}", key, e)))
        })
        .await
        .map_err(|e| Error::Storage(format!("Task join error: {}", e)))?
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || match entry.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already gone
            Err(e) => Err(Error::Storage(format!("Failed to delete '{}': {}", key, e))),
        })
        .await
        .map_err(|e| Error::Storage(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_store_service_name() {
        let store = KeyringStore::new("plasturgie-academy-test");
        assert_eq!(store.service(), "plasturgie-academy-test");
    }

    // Needs a running secret service / keychain
    #[tokio::test]
    #[ignore]
    async fn test_keyring_round_trip() {
        let store = KeyringStore::new("plasturgie-academy-test");
        store.set("token", "abc").await.unwrap();
        assert_eq!(store.get("token").await.unwrap().as_deref(), Some("abc"));
        store.remove("token").await.unwrap();
        assert!(store.get("token").await.unwrap().is_none());
        store.remove("token").await.unwrap();
    }
}
