//! Buffer manager configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_common::constants::{DEFAULT_MAXIMUM_MEMORY, MIN_MAXIMUM_MEMORY};

/// Configuration for the buffer manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Hard memory budget in bytes, enforced by eviction.
    pub maximum_memory: u64,

    /// Spill directory for transient buffers.
    ///
    /// When unset, non-destroyable transient buffers cannot be evicted:
    /// a reservation that would need to spill them fails instead.
    pub temp_directory: Option<PathBuf>,
}

impl BufferConfig {
    /// Creates a configuration with the specified memory budget.
    #[must_use]
    pub fn new(maximum_memory: u64) -> Self {
        Self {
            maximum_memory,
            temp_directory: None,
        }
    }

    /// Sets the spill directory.
    #[must_use]
    pub fn with_temp_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_directory = Some(path.into());
        self
    }

    /// Creates a small configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new(MIN_MAXIMUM_MEMORY)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.maximum_memory == 0 {
            return Err("maximum_memory must be > 0");
        }
        if let Some(dir) = &self.temp_directory {
            if dir.as_os_str().is_empty() {
                return Err("temp_directory must not be empty");
            }
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAXIMUM_MEMORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = BufferConfig::new(1024 * 1024);
        assert_eq!(config.maximum_memory, 1024 * 1024);
        assert!(config.temp_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BufferConfig::new(1024 * 1024).with_temp_directory("/tmp/strata_spill");
        assert_eq!(
            config.temp_directory.as_deref(),
            Some(std::path::Path::new("/tmp/strata_spill"))
        );
    }

    #[test]
    fn test_default_config() {
        let config = BufferConfig::default();
        assert_eq!(config.maximum_memory, DEFAULT_MAXIMUM_MEMORY);
    }

    #[test]
    fn test_validation() {
        assert!(BufferConfig::new(0).validate().is_err());
        assert!(BufferConfig::new(1).with_temp_directory("").validate().is_err());
        assert!(BufferConfig::for_testing().validate().is_ok());
    }
}
