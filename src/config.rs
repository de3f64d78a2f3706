//! Pipeline configuration.
//!
//! Settings live in `imgpipe.toml`. Loading is layered: stock defaults are
//! serialised to a TOML table, the user file is merged on top key by key, and
//! the result is deserialised and validated. A missing file means stock
//! defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "png"            # Encoding used for the final raster
//! prefix = "batch_"         # Destination file-name prefix when a job names none
//!
//! [storage]
//! root = "."                # Directory that locators are resolved against
//! url_ttl_seconds = 3600    # Lifetime advertised for download URLs
//!
//! [resize]
//! filter = "lanczos3"       # triangle | catmullrom | gaussian | lanczos3
//!
//! [processing]
//! max_processes = 4         # Max parallel jobs (omit for auto = CPU cores)
//! ```
//!
//! Config files are sparse; override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::codec::{Codec, parse_format};
use crate::ops::resize::parse_filter;
use image::ImageFormat;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "imgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `imgpipe.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Final encoding and default destination naming.
    pub output: OutputConfig,
    /// Local blob store settings.
    pub storage: StorageConfig,
    /// Resampling filter used by `resize`.
    pub resize: ResizeConfig,
    /// Parallel job settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// `codec` decides which output formats are encodable.
    pub fn validate(&self, codec: &dyn Codec) -> Result<(), ConfigError> {
        let format = parse_format(&self.output.format).ok_or_else(|| {
            ConfigError::Validation(format!(
                "output.format '{}' is not a known image format",
                self.output.format
            ))
        })?;
        if !codec.can_encode(format) {
            return Err(ConfigError::Validation(format!(
                "output.format '{}' has no encoder",
                self.output.format
            )));
        }
        if self.output.prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.prefix must not be empty".into(),
            ));
        }
        if self.output.prefix.contains('/') {
            return Err(ConfigError::Validation(
                "output.prefix must not contain '/'".into(),
            ));
        }
        if self.storage.url_ttl_seconds == 0 {
            return Err(ConfigError::Validation(
                "storage.url_ttl_seconds must be greater than 0".into(),
            ));
        }
        if parse_filter(&self.resize.filter).is_none() {
            return Err(ConfigError::Validation(format!(
                "resize.filter '{}' is not one of triangle, catmullrom, gaussian, lanczos3",
                self.resize.filter
            )));
        }
        Ok(())
    }

    /// Output encoding. Falls back to PNG for an unvalidated bad name.
    pub fn output_format(&self) -> ImageFormat {
        parse_format(&self.output.format).unwrap_or(ImageFormat::Png)
    }

    /// Resize filter. Falls back to Lanczos3 for an unvalidated bad name.
    pub fn resize_filter(&self) -> FilterType {
        parse_filter(&self.resize.filter).unwrap_or(FilterType::Lanczos3)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: String,
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            prefix: "batch_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub root: String,
    pub url_ttl_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            url_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub filter: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            filter: "lanczos3".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of jobs run at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
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

/// Read a config file as a raw TOML value; `Ok(None)` when it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
    codec: &dyn Codec,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate(codec)?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults.
pub fn load_config(path: &Path, codec: &dyn Codec) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay, codec)
}

/// A fully-commented stock `imgpipe.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# imgpipe configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Encoding for the final raster of every job that does not set
# "output_format" itself: png, jpeg, bmp, tiff, webp, gif.
format = "png"

# When a job names no destination, the result is written next to the
# source with this prefix on its file name (photos/cat.jpg becomes
# photos/batch_cat.png).
prefix = "batch_"

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory that source and destination locators are resolved against.
# Overridden by --root on the command line.
root = "."

# Lifetime, in seconds, advertised with each download URL.
url_ttl_seconds = 3600

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# Resampling filter: triangle, catmullrom, gaussian, lanczos3.
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of jobs run in parallel.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4
"#
}
