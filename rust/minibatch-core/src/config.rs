// rust/minibatch-core/src/config.rs

//! Configuration management for minibatch sources.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MinibatchError, Result};
use crate::source::{Device, LengthPolicy};

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub storage: StorageConfig,
    pub source: SourceSection,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative store paths are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for buffered reads and writes.
    pub buffer_size: usize,
    // Whether to memory-map large array files.
    pub use_mmap: bool,
    // File size threshold (bytes) at or above which files are memory-mapped.
    pub mmap_threshold: u64,
}

/// Minibatch source options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Array directory to open, relative to `storage.base_path`.
    pub store_path: PathBuf,
    /// Default placement for built batches; requests may override it.
    pub device: Device,
    /// How inexact variable-length blocks are treated.
    pub length_policy: LengthPolicy,
    /// Reject stores whose arrays disagree on record count.
    pub validate_record_counts: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("."),
            device: Device::Cpu,
            length_policy: LengthPolicy::Strict,
            validate_record_counts: true,
        }
    }
}

impl FromStr for SourceConfig {
    type Err = MinibatchError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| MinibatchError::config_with_source("failed to parse TOML config", e))
    }
}

impl SourceConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MinibatchError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `MBS_` followed by the section and field,
    // e.g. `MBS_STORAGE_BASE_PATH` or `MBS_SOURCE_DEVICE`. Values that fail
    // to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("MBS_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MBS_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("MBS_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("MBS_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Source overrides
        if let Ok(val) = std::env::var("MBS_SOURCE_STORE_PATH") {
            self.source.store_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MBS_SOURCE_DEVICE") {
            if let Ok(v) = val.parse() {
                self.source.device = v;
            }
        }
        if let Ok(val) = std::env::var("MBS_SOURCE_LENGTH_POLICY") {
            if let Ok(v) = val.parse() {
                self.source.length_policy = v;
            }
        }
        if let Ok(val) = std::env::var("MBS_SOURCE_VALIDATE_RECORD_COUNTS") {
            if let Ok(v) = val.parse() {
                self.source.validate_record_counts = v;
            }
        }

        self
    }

    // Validate all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(MinibatchError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        if self.source.store_path.as_os_str().is_empty() {
            return Err(MinibatchError::config("source.store_path must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("./data"));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 1024 * 1024);

        assert_eq!(config.source.store_path, PathBuf::from("."));
        assert_eq!(config.source.device, Device::Cpu);
        assert_eq!(config.source.length_policy, LengthPolicy::Strict);
        assert!(config.source.validate_record_counts);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: SourceConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/data/training"
            buffer_size = 131072
            use_mmap = false
            mmap_threshold = 2097152

            [source]
            store_path = "speech"
            device = "gpu:1"
            length_policy = "floor"
            validate_record_counts = false
        "#;

        let config: SourceConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/data/training"));
        assert_eq!(config.storage.buffer_size, 131072);
        assert!(!config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 2097152);

        assert_eq!(config.source.store_path, PathBuf::from("speech"));
        assert_eq!(config.source.device, Device::Gpu(1));
        assert_eq!(config.source.length_policy, LengthPolicy::Floor);
        assert!(!config.source.validate_record_counts);
    }

    #[test]
    fn test_from_str_partial_keeps_defaults() {
        let toml = r#"
            [source]
            device = "cpu"
        "#;
        let config: SourceConfig = toml.parse().unwrap();
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert_eq!(config.source.length_policy, LengthPolicy::Strict);
    }

    #[test]
    fn test_from_str_invalid() {
        let result: std::result::Result<SourceConfig, _> = "invalid = [".parse();
        assert!(result.is_err());

        let result: std::result::Result<SourceConfig, _> = "[source]\ndevice = \"tpu\"".parse();
        assert!(result.is_err());

        let result: std::result::Result<SourceConfig, _> =
            "[source]\nlength_policy = \"round\"".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [storage]
            base_path = "/tmp/test"
            "#
        )
        .unwrap();

        let config = SourceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.base_path, PathBuf::from("/tmp/test"));

        assert!(SourceConfig::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut config = SourceConfig::default();
        config.storage.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_store_path() {
        let mut config = SourceConfig::default();
        config.source.store_path = PathBuf::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store_path"));
    }

    fn clear_mbs_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("MBS_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Env vars are process-global, so all override cases share one test.
    #[test]
    fn test_env_overrides() {
        clear_mbs_env_vars();

        std::env::set_var("MBS_STORAGE_BASE_PATH", "/env/path");
        std::env::set_var("MBS_STORAGE_USE_MMAP", "false");
        std::env::set_var("MBS_SOURCE_STORE_PATH", "corpus");
        std::env::set_var("MBS_SOURCE_DEVICE", "gpu:3");
        std::env::set_var("MBS_SOURCE_LENGTH_POLICY", "floor");
        std::env::set_var("MBS_SOURCE_VALIDATE_RECORD_COUNTS", "false");

        let config = SourceConfig::default().with_env_overrides();

        assert_eq!(config.storage.base_path, PathBuf::from("/env/path"));
        assert!(!config.storage.use_mmap);
        assert_eq!(config.source.store_path, PathBuf::from("corpus"));
        assert_eq!(config.source.device, Device::Gpu(3));
        assert_eq!(config.source.length_policy, LengthPolicy::Floor);
        assert!(!config.source.validate_record_counts);

        clear_mbs_env_vars();

        // Unparseable values keep the defaults
        std::env::set_var("MBS_STORAGE_BUFFER_SIZE", "not_a_number");
        std::env::set_var("MBS_SOURCE_DEVICE", "quantum");

        let config = SourceConfig::default().with_env_overrides();
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert_eq!(config.source.device, Device::Cpu);

        clear_mbs_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut expected = SourceConfig::default();
        expected.source.device = Device::Gpu(2);
        let toml_str = toml::to_string(&expected).unwrap();
        let parsed: SourceConfig = toml_str.parse().unwrap();

        assert_eq!(expected.storage.base_path, parsed.storage.base_path);
        assert_eq!(parsed.source.device, Device::Gpu(2));
        assert_eq!(expected.source.length_policy, parsed.source.length_policy);
    }
}
