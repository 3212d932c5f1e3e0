//! TOML configuration
//!
//! Every key is optional. Values given on the command line win over the
//! file, and the file wins over the built-in defaults.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use pdfstudio_core::blank::DEFAULT_BLANK_THRESHOLD;
use pdfstudio_core::compress::CompressionLevel;
use pdfstudio_core::render::ANALYSIS_SCALE;
use pdfstudio_core::split::{DEFAULT_EVERY_N, DEFAULT_TARGET_MB};

/// File picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "pdfstudio.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub blank: BlankConfig,
    pub split: SplitConfig,
    pub compress: CompressConfig,
    pub output: OutputConfig,
    pub render: RenderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// `explicit` if given, else `pdfstudio.toml` in `dir` when it exists,
    /// else defaults
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let fallback = dir.join(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            tracing::debug!(path = %fallback.display(), "Using config file");
            return Self::from_file(fallback);
        }
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlankConfig {
    /// White pixel fraction at or above which a page is blank
    pub threshold: f64,
    /// Render scale used for analysis
    pub scale: f32,
}

impl Default for BlankConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BLANK_THRESHOLD,
            scale: ANALYSIS_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub bookmark_level: u32,
    pub every_n: u32,
    pub target_mb: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            bookmark_level: 0,
            every_n: DEFAULT_EVERY_N,
            target_mb: DEFAULT_TARGET_MB,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    pub level: CompressionLevel,
    pub remove_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Bundle multi-file results into one zip
    pub zip: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            zip: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory holding libpdfium; the system library is used otherwise
    pub pdfium_library_path: Option<PathBuf>,
}
