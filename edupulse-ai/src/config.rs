//! Configuration resolution for the affect pipeline
//!
//! Folder resolution follows the CLI → ENV → TOML → platform-default
//! priority order implemented in `edupulse_common::config`; this module
//! layers the pipeline-specific knobs (model folder, inference deadline)
//! on top.

use edupulse_common::config::{default_config_path, load_toml_config, resolve_data_folder};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "EDUPULSE_DATA_DIR";

const DB_FILE: &str = "edupulse.db";
const MODEL_SUBFOLDER: &str = "models";

/// Resolved pipeline configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Folder holding the database and (by default) model weights
    pub data_folder: PathBuf,
    /// Folder holding pretrained weight files
    pub model_folder: PathBuf,
    /// Bound on model-readiness waits and inference sub-calls
    pub inference_deadline: Duration,
    /// Event bus buffer size
    pub event_capacity: usize,
}

impl AiConfig {
    /// Resolve configuration with an optional CLI data-folder override
    pub fn resolve(cli_data_dir: Option<&str>) -> Self {
        let data_folder = resolve_data_folder(cli_data_dir, DATA_DIR_ENV);

        let model_folder = load_toml_config(&default_config_path())
            .ok()
            .and_then(|config| config.model_folder)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_folder.join(MODEL_SUBFOLDER));

        debug!(
            data_folder = %data_folder.display(),
            model_folder = %model_folder.display(),
            "Configuration resolved"
        );

        Self {
            data_folder,
            model_folder,
            inference_deadline: crate::models::DEFAULT_READY_DEADLINE,
            event_capacity: 256,
        }
    }

    /// Configuration rooted at an explicit folder (tests, embedded use)
    pub fn at_folder(folder: impl Into<PathBuf>) -> Self {
        let data_folder = folder.into();
        let model_folder = data_folder.join(MODEL_SUBFOLDER);
        Self {
            data_folder,
            model_folder,
            inference_deadline: crate::models::DEFAULT_READY_DEADLINE,
            event_capacity: 256,
        }
    }

    /// Database file path inside the data folder
    pub fn db_path(&self) -> PathBuf {
        self.data_folder.join(DB_FILE)
    }
}
