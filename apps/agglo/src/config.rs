//! # Application Configuration
//!
//! The `agglo.toml` file. Every section is optional and falls back to its
//! defaults:
//!
//! ```toml
//! [excerpt]
//! self_loops = true
//! max_edges = 500000
//! strategy = "masked"
//! block_padding = [40, 40, 40]
//! gt_label_field = "gt_merge_score"
//!
//! [dataset]
//! roi_offset = [0, 0, 0]
//! roi_shape = [4000, 4000, 4000]
//! block_shape = [1000, 1000, 1000]
//! length = 64
//!
//! [pairs]
//! patch_shape = [128, 128, 128]
//! voxel_size = [8, 8, 8]
//! raw = true
//! mask = true
//! raw_mask = false
//! ```

use agglo_core::{BlockSampler, ExcerptConfig, ExcerptError, PatchConfig, Region};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum accepted size of a configuration file.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Block dataset settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub roi_offset: [i64; 3],
    pub roi_shape: [i64; 3],
    pub block_shape: [i64; 3],
    /// Number of samples; defaults to one per block.
    pub length: Option<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            roi_offset: [0; 3],
            roi_shape: [1000; 3],
            block_shape: [1000; 3],
            length: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub excerpt: ExcerptConfig,
    pub dataset: DatasetConfig,
    pub pairs: PatchConfig,
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ExcerptError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ExcerptError::InvalidConfig(format!("Parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration at `path`, or the defaults if no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ExcerptError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path)
            .map_err(|e| ExcerptError::IoError(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ExcerptError::InvalidConfig(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| ExcerptError::IoError(format!("Read config: {}", e)))?;
        tracing::debug!("Loaded config from {:?}", path);
        Self::from_toml_str(&text)
    }

    /// Check the excerpt and pair sections. The dataset section is checked
    /// when a sampler is built from it.
    pub fn validate(&self) -> Result<(), ExcerptError> {
        self.excerpt.validate()?;
        self.pairs.validate()
    }

    /// Block sampler for the `[dataset]` section, padded by the excerpt
    /// block padding.
    pub fn sampler(&self) -> Result<BlockSampler, ExcerptError> {
        BlockSampler::new(
            Region::new(self.dataset.roi_offset, self.dataset.roi_shape),
            self.dataset.block_shape,
            self.excerpt.block_padding,
            self.dataset.length,
        )
    }
}
