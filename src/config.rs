//! Run configuration.
//!
//! Settings come from three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  --config file.toml  →  command-line flags
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "fotos_heic"     # Tree of .heic/.heif files
//! dest = "fotos_jpeg"       # Mirrored output tree
//!
//! [output]
//! format = "jpeg"           # "jpeg" or "png"
//! quality = 95              # JPEG quality (1-100)
//! subsampling = 0           # JPEG chroma: 0 = 4:4:4, 1 = 4:2:2, 2 = 4:2:0
//! progressive = true        # Progressive JPEG scans
//! optimize = true           # Optimized JPEG Huffman tables
//! preserve_metadata = true  # Keep ICC/EXIF, store pixels upright
//! overwrite = false         # Replace existing outputs
//!
//! [scan]
//! recursive = true          # Descend into subdirectories
//!
//! [processing]
//! threads = 0               # Parallel workers (0 = auto)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown
//! keys are rejected to catch typos early.

use crate::convert::ConversionOptions;
use crate::imaging::{ChromaSubsampling, OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on automatically chosen worker counts.
const MAX_AUTO_THREADS: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub scan: ScanConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("fotos_heic"),
            dest: PathBuf::from("fotos_jpeg"),
        }
    }
}

/// Encoding and write behaviour.
///
/// `quality` and `subsampling` only matter for JPEG and are ignored for PNG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quality: u32,
    pub subsampling: ChromaSubsampling,
    pub progressive: bool,
    pub optimize: bool,
    pub preserve_metadata: bool,
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: Quality::default().value(),
            subsampling: ChromaSubsampling::Yuv444,
            progressive: true,
            optimize: true,
            preserve_metadata: true,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of parallel workers; `0` picks one per available core.
    pub threads: usize,
}

impl ConvertConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if self.paths.source.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "paths.source must not be empty".into(),
            ));
        }
        if self.paths.dest.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "paths.dest must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The immutable per-job options derived from this config.
    pub fn options(&self) -> ConversionOptions {
        let out = &self.output;
        ConversionOptions {
            format: out.format,
            quality: Quality::new(out.quality),
            subsampling: out.subsampling,
            progressive: out.progressive,
            optimize: out.optimize,
            preserve_metadata: out.preserve_metadata,
            overwrite: out.overwrite,
        }
    }
}

/// Resolve the worker count.
///
/// - `0` → available cores, capped at 32
/// - `n` → exactly `n`
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    match config.threads {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_AUTO_THREADS),
        n => n,
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that file overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ConvertConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ConvertConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ConvertConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the run config: stock defaults, overlaid with `path` when given.
///
/// An explicitly named file that cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> Result<ConvertConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Printed by `--gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# heic-convert configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Input and output trees
# ---------------------------------------------------------------------------
[paths]
# Directory scanned for .heic/.heif files (extension match ignores case).
source = "fotos_heic"

# Directory the converted files are written to. Subfolders of the source
# are recreated here.
dest = "fotos_jpeg"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[output]
# "jpeg" (lossy, small) or "png" (lossless, large).
format = "jpeg"

# JPEG quality, 1-100. Above 95 grows files without visible gain.
quality = 95

# JPEG chroma subsampling: 0 = 4:4:4 (best), 1 = 4:2:2, 2 = 4:2:0.
subsampling = 0

# Progressive JPEG (renders coarse-to-fine while loading).
progressive = true

# Optimized Huffman tables (smaller JPEG, slightly slower encode).
optimize = true

# Keep the ICC profile and EXIF block. Pixels are stored upright and the
# EXIF orientation is reset to normal. When false, ICC and EXIF are dropped.
preserve_metadata = true

# Replace outputs that already exist. When false they are skipped.
overwrite = false

# ---------------------------------------------------------------------------
# Source walking
# ---------------------------------------------------------------------------
[scan]
# Descend into subdirectories of the source.
recursive = true

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Number of parallel conversions. 0 = one per CPU core (at most 32).
threads = 0
"##
}
