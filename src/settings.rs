use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::reconciler::{ReconcilerConfig, MIN_IMAGE_BYTES};

pub const SETTINGS_FILE: &str = "settings.json";
const DATA_DIR_ENV: &str = "PIXELWEIGHT_DATA_DIR";
const DEBUG_ENV: &str = "PIXELWEIGHT_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub debounce_ms: u64,
    /// Can only raise the threshold; anything below `MIN_IMAGE_BYTES` is ignored.
    pub min_image_bytes: u64,
    /// How long the observer stays armed after the reload.
    pub settle_delay_ms: u64,
    pub database_file: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_image_bytes: MIN_IMAGE_BYTES,
            settle_delay_ms: 5_000,
            database_file: "pixelweight.sqlite3".into(),
        }
    }
}

impl PipelineSettings {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            min_image_bytes: self.min_image_bytes.max(MIN_IMAGE_BYTES),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    pipeline: PipelineSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pipeline(&self) -> PipelineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pipeline
            .clone()
    }

    /// Writes the current settings out when no file exists yet, so there is
    /// something on disk to edit.
    pub fn ensure_written(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        self.persist(&guard)?;
        Ok(true)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// `PIXELWEIGHT_DATA_DIR` if set, otherwise `<platform data dir>/pixelweight`.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("pixelweight"))
        .context("no platform data directory; set PIXELWEIGHT_DATA_DIR")
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
