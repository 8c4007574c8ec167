//! Configuration and constants for the exporter.

use super::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Shard size after which the exporter rotates to a new file
pub const DEFAULT_MAX_SHARD_SIZE: u64 = 50 * 1024 * 1024;

/// Nanoseconds to microseconds, used when no sync data is available
pub const DEFAULT_RATIO: f64 = 1.0 / 1000.0;

// Kernel trace timestamps are seconds, the viewer wants microseconds
pub const SECONDS_TO_MICROS: f64 = 1_000_000.0;

/// Tag written into the kernel trace at each correlation point
pub const SYNC_MARKER: &str = "IntelSEAPI_Time_Sync";

/// Only the first few lines after the first sync marker are kept in the cut file
pub const MAX_SYNC_LINES: usize = 10;

/// Suffix shared by all auxiliary kernel-trace side files
pub const AUX_SUFFIX: &str = ".ftrace";

/// Suffix of the trimmed kernel trace written next to the shards
pub const CUT_AUX_SUFFIX: &str = ".cut.ftrace";

/// Name of the concatenated side file placed in the archive
pub const MERGED_AUX_NAME: &str = "merged.ftrace";

/// Args key for the memory breakdown summary
pub const MEMORY_ARG_KEY: &str = "CRT:Memory(size,count)";

/// Name marking the per-process metadata record
pub const PROCESS_SENTINEL: &str = "__process__";

/// Exporter configuration
///
/// **Public** - can be built in code or loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Rotate once a shard grows past this many bytes
    pub max_shard_size: u64,

    /// Tasks shorter than this (in output units) are dropped in integer mode
    pub min_dur: f64,

    /// Collapse consecutive identical task records
    pub distinct: bool,

    /// Re-parse every rendered record as a self-check
    pub debug: bool,

    /// Render timestamps as fixed-point instead of integers
    pub float_time: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
            min_dur: 0.0,
            distinct: false,
            debug: false,
            float_time: false,
        }
    }
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// Keys missing from the file keep their defaults.
    ///
    /// # Errors
    /// * `ConfigError::IoError` - If file cannot be read
    /// * `ConfigError::ParseFailed` - If TOML is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ExportConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn with_max_shard_size(mut self, bytes: u64) -> Self {
        self.max_shard_size = bytes;
        self
    }

    pub fn with_min_dur(mut self, min_dur: f64) -> Self {
        self.min_dur = min_dur;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_float_time(mut self, float_time: bool) -> Self {
        self.float_time = float_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_shard_size = 1024\nfloat_time = true").unwrap();

        let config = ExportConfig::load(file.path()).unwrap();

        assert_eq!(config.max_shard_size, 1024);
        assert!(config.float_time);
        assert!(!config.distinct);
        assert_eq!(config.min_dur, 0.0);
    }

    #[test]
    fn test_load_invalid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_shard_size = \"big\"").unwrap();

        assert!(matches!(
            ExportConfig::load(file.path()),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = ExportConfig::new()
            .with_min_dur(2.0)
            .with_distinct(true)
            .with_debug(true);

        assert_eq!(config.min_dur, 2.0);
        assert!(config.distinct);
        assert!(config.debug);
        assert_eq!(config.max_shard_size, DEFAULT_MAX_SHARD_SIZE);
    }
}
