//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Directory name used under the platform config/data dirs
pub const APP_DIR_NAME: &str = "plasturgie-academy";

/// Used when neither the config file nor `ACADEMY_API_BASE_URL` names a server
pub const FALLBACK_API_BASE_URL: &str = "http://192.168.1.14:5000/api";

/// Academy client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: FALLBACK_API_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Base URL after applying the `ACADEMY_API_BASE_URL` override
    pub fn resolved_base_url(&self) -> String {
        match env::var("ACADEMY_API_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => self.base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Where the persisted session record lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// OS credential store
    #[default]
    Keyring,
    /// JSON file in the user data directory
    File,
    /// Process memory only, nothing survives a restart
    Memory,
}

impl StorageBackend {
    pub const ALL: [StorageBackend; 3] = [Self::Keyring, Self::File, Self::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyring => "keyring",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Keyring service name
    pub service: String,
    /// Session file for the `file` backend; defaults under the data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Keyring,
            service: APP_DIR_NAME.to_string(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// Session file path for the `file` backend
    pub fn resolved_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join(APP_DIR_NAME)
            .join("session.json"))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("ACADEMY_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join(APP_DIR_NAME)
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.api.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!(
                "api.base_url must start with http:// or https:// (got '{}')",
                url
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(anyhow!("api.timeout_secs must be greater than zero"));
        }
        if self.storage.service.trim().is_empty() {
            return Err(anyhow!("storage.service must not be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "api.base_url" => Ok(self.api.base_url.clone()),
            "api.timeout_secs" => Ok(self.api.timeout_secs.to_string()),
            "storage.backend" => Ok(self.storage.backend.to_string()),
            "storage.service" => Ok(self.storage.service.clone()),
            "storage.path" => match &self.storage.path {
                Some(path) => Ok(path.display().to_string()),
                None => Ok(self
                    .storage
                    .resolved_path()
                    .map(|p| format!("{} (default)", p.display()))
                    .unwrap_or_else(|_| "(default)".to_string())),
            },
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `academy config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "api.base_url" => {
                let url = value.trim().trim_end_matches('/');
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.api.base_url = url.to_string();
            }
            "api.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.api.timeout_secs = secs;
            }
            "storage.backend" => {
                self.storage.backend = StorageBackend::parse(value).ok_or_else(|| {
                    let valid: Vec<&str> =
                        StorageBackend::ALL.iter().map(|b| b.as_str()).collect();
                    anyhow!(
                        "Invalid storage backend: {}. Valid options: {}",
                        value,
                        valid.join(", ")
                    )
                })?;
            }
            "storage.service" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Keyring service name must not be empty"));
                }
                self.storage.service = value.trim().to_string();
            }
            "storage.path" => {
                self.storage.path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value.trim()))
                };
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `academy config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "api.base_url",
            "api.timeout_secs",
            "storage.backend",
            "storage.service",
            "storage.path",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api.base_url, FALLBACK_API_BASE_URL);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.storage.backend, StorageBackend::Keyring);
        assert_eq!(config.storage.service, "plasturgie-academy");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("api.base_url", "https://academy.example.com/api/").unwrap();
        config.set("api.timeout_secs", "5").unwrap();
        config.set("storage.backend", "FILE").unwrap();

        assert_eq!(config.get("api.base_url").unwrap(), "https://academy.example.com/api");
        assert_eq!(config.get("api.timeout_secs").unwrap(), "5");
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("api.base_url", "ftp://nope").is_err());
        assert!(config.set("api.timeout_secs", "0").is_err());
        assert!(config.set("api.timeout_secs", "soon").is_err());
        assert!(config.set("storage.backend", "floppy").is_err());
        assert!(config.set("storage.service", "  ").is_err());
        assert!(config.set("no.such.key", "1").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        let keys: Vec<String> = config.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&"storage.path".to_string()));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("storage.backend", "memory").unwrap();
        config.set("api.base_url", "https://academy.example.com/api").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\nbase_url = \"localhost\"\ntimeout_secs = 10\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\nbase_url = \"https://a.example\"\ntimeout_secs = 10\n").unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage, StorageConfig::default());
        assert_eq!(loaded.api.timeout_secs, 10);
    }
}
