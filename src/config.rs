//! Library configuration module.
//!
//! Handles loading, validating, and merging `thyme.toml`. Stock defaults are
//! the base layer; a user file overrides just the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [library]
//! database = "thyme.db"          # SQLite file holding sets and photos
//!
//! [scan]
//! extensions = ["jpg", "jpeg"]   # Eligible photo extensions
//!
//! [thumbs]
//! dir = "public/thumbs"          # Artifacts root
//! big_size = 1000                # Long edge of big thumbs (uncropped)
//! small_size = 200               # Edge of small thumbs (square crop)
//! quality = 97                   # JPEG quality (1-100)
//!
//! [derive]
//! backend = "vips"               # "vips" (external vipsthumbnail) or "builtin"
//! program = "vipsthumbnail"
//! interpolator = "bicubic"
//!
//! [processing]
//! workers = 4                    # Concurrent thumbnail workers
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "thyme.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `thyme.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThymeConfig {
    pub library: LibraryConfig,
    pub scan: ScanConfig,
    pub thumbs: ThumbsConfig,
    pub derive: DeriveConfig,
    pub processing: ProcessingConfig,
}

impl ThymeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbs.quality == 0 || self.thumbs.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbs.quality must be 1-100".into(),
            ));
        }
        if self.thumbs.big_size == 0 || self.thumbs.small_size == 0 {
            return Err(ConfigError::Validation(
                "thumbs sizes must be non-zero".into(),
            ));
        }
        if self.thumbs.small_size > self.thumbs.big_size {
            return Err(ConfigError::Validation(
                "thumbs.small_size must not exceed thumbs.big_size".into(),
            ));
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::Validation(
                "processing.workers must be at least 1".into(),
            ));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        if self.derive.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "derive.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// Path of the SQLite database file.
    pub database: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("thyme.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions (without the dot, any case) treated as photos.
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Thumbnail artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbsConfig {
    /// Directory holding `<hash>_<size>.jpg` artifacts.
    pub dir: PathBuf,
    /// Long edge of big thumbs, aspect ratio preserved.
    pub big_size: u32,
    /// Edge of small thumbs, center-cropped square.
    pub small_size: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ThumbsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public/thumbs"),
            big_size: 1000,
            small_size: 200,
            quality: 97,
        }
    }
}

/// Which derivation capability produces the artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeriveBackend {
    /// Shell out to `vipsthumbnail`.
    #[default]
    Vips,
    /// Resize in-process with the `image` crate.
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeriveConfig {
    pub backend: DeriveBackend,
    /// Executable used by the `vips` backend.
    pub program: String,
    /// Resampling interpolator passed to the `vips` backend.
    pub interpolator: String,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            backend: DeriveBackend::Vips,
            program: "vipsthumbnail".to_string(),
            interpolator: "bicubic".to_string(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of concurrent derivation workers.
    ///
    /// Workers spend most of their time waiting on the derivation process, so
    /// this is not clamped to the core count.
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ThymeConfig::default()).expect("default config must serialize")
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

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ThymeConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ThymeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file is only an error when `required` is set (an explicit
/// `--config`); otherwise stock defaults are used.
pub fn load_config(path: &Path, required: bool) -> Result<ThymeConfig, ConfigError> {
    if !required && !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `thyme.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Thyme Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Library database
# ---------------------------------------------------------------------------
[library]
# SQLite file holding sets and photos. Created on first scan.
database = "thyme.db"

# ---------------------------------------------------------------------------
# Scanning
# ---------------------------------------------------------------------------
[scan]
# File extensions treated as photos (case-insensitive).
extensions = ["jpg", "jpeg"]

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbs]
# Directory holding <hash>_big.jpg and <hash>_small.jpg artifacts.
dir = "public/thumbs"

# Long edge of big thumbnails; aspect ratio is preserved.
big_size = 1000

# Edge of small thumbnails; center-cropped to a square.
small_size = 200

# JPEG quality (1 = worst, 100 = best).
quality = 97

# ---------------------------------------------------------------------------
# Derivation
# ---------------------------------------------------------------------------
[derive]
# "vips" runs the external vipsthumbnail tool, "builtin" resizes in-process.
backend = "vips"
program = "vipsthumbnail"
interpolator = "bicubic"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Concurrent thumbnail workers (at least 1).
workers = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ThymeConfig::default();
        assert_eq!(config.library.database, PathBuf::from("thyme.db"));
        assert_eq!(config.scan.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(config.thumbs.dir, PathBuf::from("public/thumbs"));
        assert_eq!(config.thumbs.big_size, 1000);
        assert_eq!(config.thumbs.small_size, 200);
        assert_eq!(config.thumbs.quality, 97);
        assert_eq!(config.derive.backend, DeriveBackend::Vips);
        assert_eq!(config.processing.workers, 4);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[thumbs]
quality = 85
"#;
        let config: ThymeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.thumbs.quality, 85);
        // Default values preserved
        assert_eq!(config.thumbs.big_size, 1000);
        assert_eq!(config.processing.workers, 4);
    }

    #[test]
    fn parse_builtin_backend() {
        let toml = r#"
[derive]
backend = "builtin"
"#;
        let config: ThymeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.derive.backend, DeriveBackend::Builtin);
        assert_eq!(config.derive.program, "vipsthumbnail");
    }

    #[test]
    fn unknown_backend_rejected() {
        let toml = r#"
[derive]
backend = "imagemagick"
"#;
        let result: Result<ThymeConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_optional_file_missing() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("thyme.toml"), false).unwrap();
        assert_eq!(config.thumbs.quality, 97);
    }

    #[test]
    fn load_config_required_file_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("thyme.toml"), true);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thyme.toml");
        fs::write(
            &path,
            r#"
[library]
database = "/var/lib/thyme/library.db"

[processing]
workers = 8
"#,
        )
        .unwrap();

        let config = load_config(&path, true).unwrap();
        assert_eq!(
            config.library.database,
            PathBuf::from("/var/lib/thyme/library.db")
        );
        assert_eq!(config.processing.workers, 8);
        assert_eq!(config.thumbs.small_size, 200);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thyme.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path, true);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thyme.toml");
        fs::write(
            &path,
            r#"
[processing]
workers = 0
"#,
        )
        .unwrap();

        let result = load_config(&path, true);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[thumbs]
big_size = 1000
quality = 97
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[thumbs]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let thumbs = merged.get("thumbs").unwrap();
        assert_eq!(thumbs.get("quality").unwrap().as_integer(), Some(70));
        assert_eq!(thumbs.get("big_size").unwrap().as_integer(), Some(1000));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str(r#"extensions = ["jpg", "jpeg"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"extensions = ["png"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(
            merged.get("extensions").unwrap().as_array().unwrap().len(),
            1
        );
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[thumbs]
qualty = 90
"#;
        let result: Result<ThymeConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ThymeConfig, _> = toml::from_str("[thumbz]\nquality = 90\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(ThymeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = ThymeConfig::default();
        config.thumbs.quality = 100;
        assert!(config.validate().is_ok());

        config.thumbs.quality = 0;
        assert!(config.validate().is_err());

        config.thumbs.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn validate_small_larger_than_big() {
        let mut config = ThymeConfig::default();
        config.thumbs.small_size = 1200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_sizes() {
        let mut config = ThymeConfig::default();
        config.thumbs.big_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_extensions() {
        let mut config = ThymeConfig::default();
        config.scan.extensions.clear();
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value =
            toml::from_str(stock_config_toml()).expect("stock config must be valid TOML");
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ThymeConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ThymeConfig::default();
        assert_eq!(config.library.database, defaults.library.database);
        assert_eq!(config.scan.extensions, defaults.scan.extensions);
        assert_eq!(config.thumbs.dir, defaults.thumbs.dir);
        assert_eq!(config.thumbs.big_size, defaults.thumbs.big_size);
        assert_eq!(config.thumbs.small_size, defaults.thumbs.small_size);
        assert_eq!(config.thumbs.quality, defaults.thumbs.quality);
        assert_eq!(config.derive.backend, defaults.derive.backend);
        assert_eq!(config.processing.workers, defaults.processing.workers);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in ["library", "scan", "thumbs", "derive", "processing"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
