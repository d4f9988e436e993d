//! Store configuration
//!
//! Settings only affect how the archive is (re)written at close. Reading
//! accepts every entry method the container library understands, whatever the
//! configuration says.

use crate::core::error::{Result, ZipcarError};
use serde::{Deserialize, Serialize};

/// Entry compression used when the archive is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Stored entries, no compression
    None,
    /// Deflate (readable by every ZIP tool)
    #[default]
    Deflate,
    /// Zstd (method 93, smaller but less widely supported)
    Zstd,
}

impl CompressionMethod {
    /// Accepted compression level range, if the method takes one
    pub fn level_range(&self) -> Option<(i64, i64)> {
        match self {
            CompressionMethod::None => None,
            CompressionMethod::Deflate => Some((0, 9)),
            CompressionMethod::Zstd => Some((1, 22)),
        }
    }

    pub(crate) fn to_zip(self) -> zip::CompressionMethod {
        match self {
            CompressionMethod::None => zip::CompressionMethod::Stored,
            CompressionMethod::Deflate => zip::CompressionMethod::Deflated,
            CompressionMethod::Zstd => zip::CompressionMethod::Zstd,
        }
    }
}

/// Store configuration
///
/// # Examples
///
/// ```
/// use zipcar::{CompressionMethod, StoreConfig};
///
/// let config = StoreConfig::from_toml_str(r#"
///     compression = "zstd"
///     compression_level = 3
///     atomic_replace = true
/// "#).unwrap();
///
/// assert_eq!(config.compression, CompressionMethod::Zstd);
/// assert!(config.atomic_replace);
/// assert!(config.create_if_missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Method for entries written at close
    pub compression: CompressionMethod,

    /// Method-specific level, library default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<i64>,

    /// Write the new archive to a sibling temp file and rename it over the
    /// original, instead of truncating the original in place
    pub atomic_replace: bool,

    /// Create a new, empty store when the path does not exist
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            compression: CompressionMethod::Deflate,
            compression_level: None,
            atomic_replace: false,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Stored entries, no compression
    pub fn uncompressed() -> Self {
        StoreConfig {
            compression: CompressionMethod::None,
            ..Default::default()
        }
    }

    /// Zstd entries at the given level
    pub fn zstd(level: i64) -> Self {
        StoreConfig {
            compression: CompressionMethod::Zstd,
            compression_level: Some(level),
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ZipcarError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let Some(level) = self.compression_level else {
            return Ok(());
        };

        match self.compression.level_range() {
            None => Err(ZipcarError::Config(format!(
                "compression level {} given for uncompressed entries",
                level
            ))),
            Some((min, max)) if level < min || level > max => Err(ZipcarError::Config(format!(
                "compression level {} out of range {}..={} for {:?}",
                level, min, max, self.compression
            ))),
            Some(_) => Ok(()),
        }
    }
}
