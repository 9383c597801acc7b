use anyhow::{Context, Result};
use directories::ProjectDirs;
use protodeck_core::config::Config;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";

/// Locates and reads the JSON configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses `config.json` in the platform config directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("dev", "protodeck", "protodeck")
            .context("Could not determine config directory")?;

        Ok(Self {
            config_path: proj_dirs.config_dir().join(CONFIG_FILE_NAME),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read {}", self.config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("absent.json"));

        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"include_dirs": ["vendor/protos"], "call_timeout_ms": 0, "codec": {"emit_default_fields": true}}"#,
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load().unwrap();

        assert_eq!(config.include_dirs, vec![PathBuf::from("vendor/protos")]);
        assert_eq!(config.call_timeout(), None);
        assert!(config.codec.emit_default_fields);
        assert!(config.codec.deny_unknown_fields);
        assert!(config.well_known_types);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = ConfigManager::with_path(&path).load().unwrap_err();

        assert!(err.to_string().contains("Invalid configuration"));
    }
}
