//! Engine configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Bytes written on a top-level file between `changed` notifications.
pub const REFRESH_ITEM_BYTES: u64 = 50_000_000;

/// Configuration for the operation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Bytes per read/write chunk.
    #[builder(default = "4096")]
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Items per remove/move step, and chunks per copy step.
    #[builder(default = "5")]
    #[serde(default = "default_step_items")]
    pub step_items: usize,

    /// Bytes written inside a single file between progress notifications.
    #[builder(default = "1024 * 1024")]
    #[serde(default = "default_progress_bytes")]
    pub progress_bytes: u64,

    /// Bytes written on a top-level file between `changed` notifications.
    #[builder(default = "REFRESH_ITEM_BYTES")]
    #[serde(default = "default_refresh_item_bytes")]
    pub refresh_item_bytes: u64,

    /// Verify free space on the destination before copying.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub check_disk_space: bool,

    /// Copy permissions and modification time onto finished files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub preserve_metadata: bool,
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    4096
}

fn default_step_items() -> usize {
    5
}

fn default_progress_bytes() -> u64 {
    1024 * 1024
}

fn default_refresh_item_bytes() -> u64 {
    REFRESH_ITEM_BYTES
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == Some(0) {
            return Err("Buffer size must be greater than zero".to_string());
        }
        if self.step_items == Some(0) {
            return Err("Step items must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Bytes moved by one copy step.
    pub fn bytes_per_step(&self) -> usize {
        self.buffer_size.saturating_mul(self.step_items)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            step_items: default_step_items(),
            progress_bytes: default_progress_bytes(),
            refresh_item_bytes: REFRESH_ITEM_BYTES,
            check_disk_space: true,
            preserve_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .buffer_size(8usize)
            .step_items(2usize)
            .check_disk_space(false)
            .build()
            .unwrap();

        assert_eq!(config.buffer_size, 8);
        assert_eq!(config.bytes_per_step(), 16);
        assert!(!config.check_disk_space);
        assert!(config.preserve_metadata);
    }

    #[test]
    fn test_config_rejects_zero_buffer() {
        assert!(EngineConfig::builder().buffer_size(0usize).build().is_err());
        assert!(EngineConfig::builder().step_items(0usize).build().is_err());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = EngineConfig::builder().build().unwrap();
        let default = EngineConfig::default();
        assert_eq!(built.buffer_size, default.buffer_size);
        assert_eq!(built.step_items, default.step_items);
        assert_eq!(built.progress_bytes, default.progress_bytes);
        assert_eq!(built.refresh_item_bytes, default.refresh_item_bytes);
    }
}
