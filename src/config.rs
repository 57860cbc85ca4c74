use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;
use crate::transform::Mode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Post-processing applied to recognised text
    pub mode: Mode,
    /// Start to tray instead of opening the selection overlay right away
    pub background_mode: bool,
    /// Cancel a selection left open longer than this
    pub selection_timeout_secs: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Parse,
            background_mode: false,
            selection_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrConfig {
    /// Tesseract language codes, joined with '+' on invocation
    pub languages: Vec<String>,
    pub tesseract_cmd: PathBuf,
    pub timeout_secs: Option<u64>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            tesseract_cmd: PathBuf::from("tesseract"),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: crate::update::GITHUB_RELEASES_URL.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            capture: CaptureConfig::default(),
            ocr: OcrConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the platform config file, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_file = paths::get_config_file()?;
        Self::load_from(&config_file)
    }

    /// Load config from `path`, writing defaults there when the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;

            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;

            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the platform config file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents =
            serde_json::to_string_pretty(&self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn ocr_timeout(&self) -> Option<Duration> {
        self.ocr.timeout_secs.map(Duration::from_secs)
    }

    pub fn selection_timeout(&self) -> Option<Duration> {
        self.capture.selection_timeout_secs.map(Duration::from_secs)
    }
}
