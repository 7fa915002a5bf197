//! Application configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use pixels::CaptureRect;
use serde::{Deserialize, Serialize};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "GLASSNAP_CONFIG";

/// PNG compression effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    Fast,
    Default,
    /// Smallest files, matching zlib level 9
    #[default]
    Best,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Region to capture; the whole virtual screen when absent
    pub region: Option<CaptureRect>,
    /// Wait before shooting, in milliseconds
    #[serde(alias = "delayMs")]
    pub delay_ms: u64,
    /// Directory for the PNG; the Pictures folder when absent
    #[serde(alias = "outputDir")]
    pub output_dir: Option<PathBuf>,
    /// File name; a timestamped name when absent
    #[serde(alias = "fileName")]
    pub file_name: Option<String>,
    pub compression: Compression,
}

impl AppConfig {
    /// Load from the file named on the command line or in `GLASSNAP_CONFIG`,
    /// falling back to defaults when neither is given
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::args_os()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(region) = &self.region {
            region.validate().context("invalid region")?;
        }
        if let Some(name) = &self.file_name {
            if name.is_empty() || name.contains(['/', '\\']) {
                bail!("file_name must be a bare file name, got {name:?}");
            }
        }
        Ok(())
    }

    /// Directory the screenshot is written to
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::picture_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
