//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// TOML configuration file contents (`~/.config/edupulse/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the SQLite database and model weights
    pub data_folder: Option<String>,
    /// Override folder for pretrained model weight files
    pub model_folder: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (tracing env-filter syntax), e.g. "info" or "edupulse_ai=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable (`EDUPULSE_DATA_DIR`)
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        debug!("Data folder from command line: {}", path);
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            debug!("Data folder from {}: {}", env_var_name, path);
            return PathBuf::from(path);
        }
    }

    if let Ok(config) = load_toml_config(&default_config_path()) {
        if let Some(folder) = config.data_folder {
            debug!("Data folder from TOML config: {}", folder);
            return PathBuf::from(folder);
        }
    }

    default_data_folder()
}

/// Load and parse the TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}

/// Default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("edupulse").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./edupulse.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("edupulse"))
        .unwrap_or_else(|| PathBuf::from("./edupulse_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins_over_everything() {
        let folder = resolve_data_folder(Some("/tmp/pulse-data"), "EDUPULSE_TEST_UNSET_VAR");
        assert_eq!(folder, PathBuf::from("/tmp/pulse-data"));
    }

    #[test]
    fn toml_config_parses_with_defaults() {
        let config: TomlConfig = toml::from_str("data_folder = \"/srv/edupulse\"").unwrap();
        assert_eq!(config.data_folder.as_deref(), Some("/srv/edupulse"));
        assert_eq!(config.logging.level, "info");
        assert!(config.model_folder.is_none());
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let result = load_toml_config(Path::new("/nonexistent/edupulse/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn config_file_round_trips_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_folder = \"/srv/edupulse\"\nmodel_folder = \"/srv/models\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = load_toml_config(&path).unwrap();
        assert_eq!(config.data_folder.as_deref(), Some("/srv/edupulse"));
        assert_eq!(config.model_folder.as_deref(), Some("/srv/models"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn malformed_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_folder = [not valid").unwrap();

        let result = load_toml_config(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
