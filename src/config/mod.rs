//! Configuration storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::sync::DEFAULT_TABLE;

/// Default retention cap for the local history.
pub const DEFAULT_MAX_RECORDS: usize = 1000;

const ENV_REMOTE_URL: &str = "CREATOROS_SUPABASE_URL";
const ENV_REMOTE_KEY: &str = "CREATOROS_SUPABASE_ANON_KEY";
const ENV_STORAGE_DIR: &str = "CREATOROS_STORAGE_DIR";

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the message history (defaults to the platform data dir)
    pub storage_dir: Option<PathBuf>,
    /// Maximum number of messages kept locally; 0 disables the cap
    pub max_records: Option<usize>,
    /// External record store used as a mirror
    pub remote: Option<RemoteConfig>,
}

/// Connection settings for the external record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
    pub table: Option<String>,
}

impl RemoteConfig {
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_TABLE)
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "creatoros", "creatoros")
            .context("Could not determine config directory")
    }

    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // The anon key is not secret, but keep the file private anyway
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Override file values with environment variables.
    ///
    /// The remote store is only configured from the environment when both
    /// the URL and the key are present.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_STORAGE_DIR) {
            self.storage_dir = Some(PathBuf::from(dir));
        }

        match (non_empty(ENV_REMOTE_URL), non_empty(ENV_REMOTE_KEY)) {
            (Some(url), Some(anon_key)) => {
                let table = self.remote.as_ref().and_then(|r| r.table.clone());
                self.remote = Some(RemoteConfig {
                    url,
                    anon_key,
                    table,
                });
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of {} and {} is set, ignoring both",
                    ENV_REMOTE_URL,
                    ENV_REMOTE_KEY
                );
            }
            (None, None) => {}
        }
    }

    /// Directory for the message history file.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Effective retention cap; `None` means unbounded.
    pub fn max_records(&self) -> Option<usize> {
        match self.max_records.unwrap_or(DEFAULT_MAX_RECORDS) {
            0 => None,
            n => Some(n),
        }
    }

    /// Remote settings, if usable.
    pub fn remote(&self) -> Option<&RemoteConfig> {
        self.remote
            .as_ref()
            .filter(|r| !r.url.trim().is_empty() && !r.anon_key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            storage_dir = "/var/lib/creatoros"
            max_records = 50

            [remote]
            url = "https://abc.supabase.co"
            anon_key = "anon"
            table = "messages"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/var/lib/creatoros"));
        assert_eq!(config.max_records(), Some(50));
        assert_eq!(config.remote().unwrap().table(), "messages");
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.max_records(), Some(DEFAULT_MAX_RECORDS));
        assert!(config.remote().is_none());

        let unbounded = Config::parse("max_records = 0").unwrap();
        assert_eq!(unbounded.max_records(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::parse(
            r#"
            [remote]
            url = "https://old.example"
            anon_key = "old"
            table = "history"
            "#,
        )
        .unwrap();

        config.apply_env(env(&[
            (ENV_REMOTE_URL, "https://new.example"),
            (ENV_REMOTE_KEY, "new"),
            (ENV_STORAGE_DIR, "/tmp/creatoros"),
        ]));

        let remote = config.remote().unwrap();
        assert_eq!(remote.url, "https://new.example");
        assert_eq!(remote.anon_key, "new");
        assert_eq!(remote.table(), "history");
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/creatoros")));
    }

    #[test]
    fn test_partial_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_REMOTE_URL, "https://new.example")]));
        assert!(config.remote().is_none());
    }

    #[test]
    fn test_blank_remote_is_unusable() {
        let config = Config::parse(
            r#"
            [remote]
            url = ""
            anon_key = "anon"
            "#,
        )
        .unwrap();
        assert!(config.remote().is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            storage_dir: Some(PathBuf::from("/data")),
            max_records: Some(10),
            remote: Some(RemoteConfig {
                url: "https://abc.supabase.co".to_string(),
                anon_key: "anon".to_string(),
                table: None,
            }),
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }
}
