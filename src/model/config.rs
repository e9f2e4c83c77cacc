use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::document::MASTER_TAG;

/// Configuration from taskdeck.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often the bound file is re-read
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// A read taking longer than this counts as lost access
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Save snapshots of loaded documents
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Store file; defaults to $XDG_DATA_HOME/taskdeck/projects.json
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            enabled: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Tag shown when --tag is not given
    #[serde(default = "default_tag")]
    pub default_tag: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            default_tag: default_tag(),
        }
    }
}

fn default_tag() -> String {
    MASTER_TAG.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: DeckConfig = toml::from_str("").unwrap();
        assert_eq!(config.sync.poll_interval_ms, 1000);
        assert_eq!(config.sync.read_timeout_ms, 5000);
        assert!(config.store.enabled);
        assert!(config.store.path.is_none());
        assert_eq!(config.view.default_tag, "master");
    }

    #[test]
    fn partial_sections() {
        let config: DeckConfig = toml::from_str(
            r#"
[sync]
poll_interval_ms = 250

[store]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.sync.read_timeout(), Duration::from_secs(5));
        assert!(!config.store.enabled);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let sync = SyncConfig {
            poll_interval_ms: 0,
            read_timeout_ms: 0,
        };
        assert_eq!(sync.poll_interval(), Duration::from_millis(1));
        assert_eq!(sync.read_timeout(), Duration::from_millis(1));
    }
}
