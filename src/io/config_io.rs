use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::DeckConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the config file path, respecting XDG_CONFIG_HOME
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("taskdeck").join("taskdeck.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read configuration from `path`. A missing file yields the defaults.
pub fn read_config_from(path: &Path) -> Result<DeckConfig, ConfigError> {
    if !path.exists() {
        return Ok(DeckConfig::default());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read configuration from the default location
pub fn read_config() -> Result<DeckConfig, ConfigError> {
    read_config_from(&config_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_from(&tmp.path().join("taskdeck.toml")).unwrap();
        assert_eq!(config.sync.poll_interval_ms, 1000);
        assert!(config.store.enabled);
    }

    #[test]
    fn reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("taskdeck.toml");
        fs::write(
            &path,
            "[sync]\npoll_interval_ms = 250\n\n[store]\nenabled = false\n",
        )
        .unwrap();
        let config = read_config_from(&path).unwrap();
        assert_eq!(config.sync.poll_interval_ms, 250);
        assert_eq!(config.sync.read_timeout_ms, 5000);
        assert!(!config.store.enabled);
        assert_eq!(config.view.default_tag, "master");
    }

    #[test]
    fn malformed_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("taskdeck.toml");
        fs::write(&path, "[sync\npoll_interval_ms = ").unwrap();
        assert!(matches!(
            read_config_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
