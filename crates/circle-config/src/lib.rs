use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found. Run 'circle init' first.")]
    NotFound,
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to get home directory")]
    NoHomeDir,
    #[error("No user configured. Run 'circle init' first.")]
    NoUser,
    #[error("No group selected. Run 'circle group use <id>' first.")]
    NoGroupSelected,
}

/// Client configuration stored in ~/.screencircle/config.json
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub user: Option<UserConfig>,
    /// Id of the group shown by default
    #[serde(default)]
    pub current_group: Option<String>,
    /// Groups this client has created or joined (id -> name)
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
    /// Local ledger database (defaults to ~/.screencircle/ledger.db)
    #[serde(default)]
    pub ledger_url: Option<String>,
    /// Shared store database (defaults to ~/.screencircle/shared.db)
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Identity supplied by the identity provider at sign-in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Per-member read bound for group snapshots
    #[serde(default = "default_member_read_timeout_secs")]
    pub member_read_timeout_secs: u64,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_member_read_timeout_secs() -> u64 {
    12
}

fn default_sync_interval_secs() -> u64 {
    15 * 60
}

fn default_max_backoff_secs() -> u64 {
    5 * 60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            member_read_timeout_secs: default_member_read_timeout_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl SyncSettings {
    pub fn member_read_timeout(&self) -> Duration {
        Duration::from_secs(self.member_read_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl ClientConfig {
    /// Load config from default path (~/.screencircle/config.json)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// Load config from custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::Read(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load config, or start from defaults when the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::NotFound) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Save config to custom path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// Get default config path (~/.screencircle/config.json)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join(".screencircle")
            .join("config.json"))
    }

    pub fn user(&self) -> Result<&UserConfig, ConfigError> {
        self.user.as_ref().ok_or(ConfigError::NoUser)
    }

    /// Currently selected group id and its saved name
    pub fn current_group(&self) -> Result<(&str, Option<&str>), ConfigError> {
        let id = self
            .current_group
            .as_deref()
            .ok_or(ConfigError::NoGroupSelected)?;
        Ok((id, self.groups.get(id).map(String::as_str)))
    }

    /// Remember a group; the first saved group becomes the current one
    pub fn add_group(&mut self, group_id: &str, name: &str) {
        self.groups.insert(group_id.to_string(), name.to_string());
        if self.current_group.is_none() {
            self.current_group = Some(group_id.to_string());
        }
    }

    /// Forget a group, clearing the selection if it was current
    pub fn remove_group(&mut self, group_id: &str) {
        self.groups.remove(group_id);
        if self.current_group.as_deref() == Some(group_id) {
            self.clear_group_data();
        }
    }

    pub fn set_current_group(&mut self, group_id: &str) {
        self.current_group = Some(group_id.to_string());
    }

    pub fn clear_group_data(&mut self) {
        self.current_group = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn user() -> UserConfig {
        UserConfig {
            user_id: "user-123".to_string(),
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
        }
    }

    #[test]
    fn test_client_config_roundtrip() {
        let mut config = ClientConfig {
            user: Some(user()),
            ..Default::default()
        };
        config.add_group("g1", "Night Owls");

        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: ClientConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.user.is_none());
        assert!(parsed.groups.is_empty());
        assert_eq!(parsed.sync, SyncSettings::default());
        assert_eq!(parsed.sync.member_read_timeout(), Duration::from_secs(12));

        let parsed: ClientConfig =
            serde_json::from_str(r#"{"sync": {"sync_interval_secs": 60}}"#).unwrap();
        assert_eq!(parsed.sync.sync_interval(), Duration::from_secs(60));
        assert_eq!(parsed.sync.max_backoff(), Duration::from_secs(300));
    }

    #[test]
    fn test_retired_sync_keys_are_ignored() {
        let parsed: ClientConfig =
            serde_json::from_str(r#"{"sync": {"catch_up_days": 3, "max_backoff_secs": 30}}"#)
                .unwrap();
        assert_eq!(parsed.sync.max_backoff(), Duration::from_secs(30));

        let written = serde_json::to_value(&parsed).unwrap();
        assert!(written["sync"].get("catch_up_days").is_none());
    }

    #[test]
    fn test_first_group_becomes_current() {
        let mut config = ClientConfig::default();
        config.add_group("g1", "One");
        config.add_group("g2", "Two");

        assert_eq!(config.current_group().unwrap(), ("g1", Some("One")));
    }

    #[test]
    fn test_remove_current_group_clears_selection() {
        let mut config = ClientConfig::default();
        config.add_group("g1", "One");
        config.add_group("g2", "Two");
        config.set_current_group("g2");

        config.remove_group("g1");
        assert_eq!(config.current_group().unwrap().0, "g2");

        config.remove_group("g2");
        assert!(matches!(
            config.current_group(),
            Err(ConfigError::NoGroupSelected)
        ));
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_user_required() {
        let config = ClientConfig::default();
        assert!(matches!(config.user(), Err(ConfigError::NoUser)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        assert!(matches!(
            ClientConfig::load_from(&path),
            Err(ConfigError::NotFound)
        ));
        assert_eq!(
            ClientConfig::load_or_default(&path).unwrap(),
            ClientConfig::default()
        );
    }

    #[test]
    fn test_load_from_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        assert!(matches!(
            ClientConfig::load_from(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ClientConfig {
            user: Some(user()),
            ..Default::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(ClientConfig::load_from(&path).unwrap(), config);
    }
}
