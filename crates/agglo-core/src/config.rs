//! # Excerpt Configuration
//!
//! Options consumed by the assembler. Passed explicitly into every call; the
//! core holds no process-wide configuration. The app layer reads them from
//! the `[excerpt]` table of its TOML file.

use crate::primitives::DEFAULT_MAX_EDGES;
use crate::schema::EdgeSchema;
use crate::ExcerptError;
use serde::{Deserialize, Serialize};

/// Which extra masking an excerpt carries.
///
/// The two variants differ only in how `roi_mask` is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskStrategy {
    /// Every directed edge takes part in the loss (subject to the label mask).
    #[default]
    Unmasked,
    /// Only directed edges whose source node lies inside the inner region take
    /// part in the loss.
    Masked,
}

/// Options for building one graph excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcerptConfig {
    /// Append one self-loop per node before directed expansion.
    pub self_loops: bool,
    /// Hard cap on the number of directed edges.
    pub max_edges: usize,
    /// Attribute names within the edge schema.
    #[serde(flatten)]
    pub schema: EdgeSchema,
    /// Masking variant.
    pub strategy: MaskStrategy,
    /// Padding around each block, in world units (z, y, x).
    pub block_padding: [i64; 3],
}

impl Default for ExcerptConfig {
    fn default() -> Self {
        Self {
            self_loops: false,
            max_edges: DEFAULT_MAX_EDGES,
            schema: EdgeSchema::default(),
            strategy: MaskStrategy::default(),
            block_padding: [0; 3],
        }
    }
}

impl ExcerptConfig {
    /// Reject values no excerpt could satisfy.
    pub fn validate(&self) -> Result<(), ExcerptError> {
        if self.max_edges == 0 {
            return Err(ExcerptError::InvalidConfig(
                "max_edges must be greater than 0".to_string(),
            ));
        }
        if self.block_padding.iter().any(|&p| p < 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "block_padding must be non-negative, got {:?}",
                self.block_padding
            )));
        }
        self.schema.validate()
    }
}
