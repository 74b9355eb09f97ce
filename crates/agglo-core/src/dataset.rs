//! # Block Dataset
//!
//! Splits a region of interest into training blocks and builds one excerpt per
//! block.
//!
//! The total ROI is first padded inward so that every padded block stays within
//! the original ROI. Inner blocks tile the padded ROI row-major over
//! `(z, y, x)`; each excerpt is read from the inner block grown by the padding
//! and masked against the inner block.

use crate::assembler::Assembler;
use crate::{ExcerptError, GraphExcerpt, Region};

/// Maps a dataset index to an `(outer, inner)` block pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSampler {
    roi: Region,
    block_shape: [i64; 3],
    padding: [i64; 3],
    tiles: [i64; 3],
    length: usize,
}

impl BlockSampler {
    /// Create a sampler over `roi`.
    ///
    /// `length` defaults to the number of tiles; larger values wrap around.
    pub fn new(
        roi: Region,
        block_shape: [i64; 3],
        padding: [i64; 3],
        length: Option<usize>,
    ) -> Result<Self, ExcerptError> {
        if block_shape.iter().any(|&s| s <= 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "block shape must be positive, got {:?}",
                block_shape
            )));
        }
        if padding.iter().any(|&p| p < 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "block padding must be non-negative, got {:?}",
                padding
            )));
        }

        let padded = roi.shrink(padding);
        if padded.is_empty() {
            return Err(ExcerptError::InvalidConfig(format!(
                "padding {:?} leaves nothing of roi {}",
                padding, roi
            )));
        }

        let tiles = [0, 1, 2].map(|axis| padded.shape[axis] / block_shape[axis]);
        if tiles.iter().any(|&t| t == 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "block shape {:?} does not fit into padded roi {}",
                block_shape, padded
            )));
        }

        let tile_count = tiles.iter().product::<i64>() as usize;
        let length = length.unwrap_or(tile_count);
        tracing::debug!(roi = %padded, tiles = ?tiles, length, "block sampler");

        Ok(Self {
            roi: padded,
            block_shape,
            padding,
            tiles,
            length,
        })
    }

    /// The ROI after inward padding.
    #[must_use]
    pub fn roi(&self) -> &Region {
        &self.roi
    }

    /// Number of distinct inner blocks.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.iter().product::<i64>() as usize
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The `(outer, inner)` regions for sample `idx`.
    #[must_use]
    pub fn block(&self, idx: usize) -> (Region, Region) {
        let tile = (idx % self.tile_count()) as i64;
        let [_, ty, tx] = self.tiles;
        let coords = [tile / (ty * tx), (tile / tx) % ty, tile % tx];

        let mut offset = self.roi.offset;
        for axis in 0..3 {
            offset[axis] += coords[axis] * self.block_shape[axis];
        }
        let inner = Region::new(offset, self.block_shape);
        (inner.grow(self.padding), inner)
    }
}

/// A sequence of excerpts, one per sampled block.
#[derive(Debug)]
pub struct ExcerptDataset<'a> {
    assembler: Assembler<'a>,
    sampler: BlockSampler,
}

impl<'a> ExcerptDataset<'a> {
    #[must_use]
    pub fn new(assembler: Assembler<'a>, sampler: BlockSampler) -> Self {
        Self { assembler, sampler }
    }

    #[must_use]
    pub fn sampler(&self) -> &BlockSampler {
        &self.sampler
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sampler.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }

    /// Build the excerpt for sample `idx`.
    pub fn get(&self, idx: usize) -> Result<GraphExcerpt, ExcerptError> {
        let (outer, inner) = self.sampler.block(idx);
        self.assembler.assemble_with_inner(&outer, &inner)
    }

    /// Iterate over every sample in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<GraphExcerpt, ExcerptError>> + '_ {
        (0..self.len()).map(|idx| self.get(idx))
    }

    /// Mean and population standard deviation of all edge targets across the
    /// dataset. Blocks without edges contribute nothing.
    pub fn targets_mean_std(&self) -> Result<(f64, f64), ExcerptError> {
        let mut stats = TargetStats::default();
        for excerpt in self.iter() {
            match excerpt {
                Ok(excerpt) => stats.add(&excerpt),
                Err(ExcerptError::EmptyRegion { region, .. }) => {
                    tracing::debug!(%region, "empty block skipped in target statistics");
                }
                Err(e) => return Err(e),
            }
        }
        stats.mean_std().ok_or_else(|| {
            ExcerptError::InvalidConfig("dataset holds no targets".to_string())
        })
    }
}

/// Running mean and variance of edge targets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl TargetStats {
    /// Add every target of `excerpt`.
    pub fn add(&mut self, excerpt: &GraphExcerpt) {
        for &target in &excerpt.targets {
            let t = target as f64;
            self.count += 1;
            self.sum += t;
            self.sum_sq += t * t;
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean and population standard deviation, `None` before any target.
    #[must_use]
    pub fn mean_std(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Some((mean, variance.sqrt()))
    }
}
