//! # Core Type Definitions
//!
//! This module contains the typed records that flow through excerpt construction:
//! - Identifiers and geometry (`NodeId`, `Position`, `Region`)
//! - Region adjacency graph records (`NodeRecord`, `EdgeRecord`)
//! - Error types (`ExcerptError`)
//!
//! Records are validated once at the query boundary (see `schema`) and are
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Globally unique, sparse identifier of a fragment (supervoxel) in the RAG.
///
/// Assigned by the upstream segmentation; unbounded and never dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Centre of mass of a fragment, in world units (nanometres), ordered z, y, x.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }

    /// The position as a `[z, y, x]` array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.z, self.y, self.x]
    }

    /// The position narrowed to single precision for tensor storage.
    #[must_use]
    pub fn to_f32(self) -> [f32; 3] {
        [self.z as f32, self.y as f32, self.x as f32]
    }
}

/// An axis-aligned box in world units, ordered z, y, x.
///
/// Containment is half-open: `offset <= p < offset + shape` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub offset: [i64; 3],
    pub shape: [i64; 3],
}

impl Region {
    /// Create a new region.
    #[must_use]
    pub const fn new(offset: [i64; 3], shape: [i64; 3]) -> Self {
        Self { offset, shape }
    }

    /// Exclusive upper corner.
    #[must_use]
    pub fn end(&self) -> [i64; 3] {
        [
            self.offset[0].saturating_add(self.shape[0]),
            self.offset[1].saturating_add(self.shape[1]),
            self.offset[2].saturating_add(self.shape[2]),
        ]
    }

    /// A region is empty if any extent is zero or negative.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&s| s <= 0)
    }

    /// Check whether a position lies inside the region.
    #[must_use]
    pub fn contains(&self, position: &Position) -> bool {
        let end = self.end();
        position
            .to_array()
            .iter()
            .enumerate()
            .all(|(axis, &p)| p >= self.offset[axis] as f64 && p < end[axis] as f64)
    }

    /// Enlarge the region by `amount` on every side.
    #[must_use]
    pub fn grow(&self, amount: [i64; 3]) -> Self {
        let mut grown = *self;
        for axis in 0..3 {
            grown.offset[axis] = self.offset[axis].saturating_sub(amount[axis]);
            grown.shape[axis] = self.shape[axis].saturating_add(amount[axis].saturating_mul(2));
        }
        grown
    }

    /// Shrink the region by `amount` on every side.
    #[must_use]
    pub fn shrink(&self, amount: [i64; 3]) -> Self {
        self.grow(amount.map(|a| a.saturating_neg()))
    }

    /// Snap both corners to the closest multiple of `voxel_size`.
    pub fn snap_to_grid(&self, voxel_size: [i64; 3]) -> Result<Self, ExcerptError> {
        if voxel_size.iter().any(|&v| v <= 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "voxel size must be positive, got {:?}",
                voxel_size
            )));
        }
        let end = self.end();
        let mut snapped = *self;
        for axis in 0..3 {
            let begin = closest_multiple(self.offset[axis], voxel_size[axis]);
            let stop = closest_multiple(end[axis], voxel_size[axis]);
            snapped.offset[axis] = begin;
            snapped.shape[axis] = stop - begin;
        }
        Ok(snapped)
    }
}

fn closest_multiple(value: i64, step: i64) -> i64 {
    (value + step / 2).div_euclid(step) * step
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.end();
        write!(
            f,
            "[{}:{}, {}:{}, {}:{}] ({}, {}, {})",
            self.offset[0],
            end[0],
            self.offset[1],
            end[1],
            self.offset[2],
            end[2],
            self.shape[0],
            self.shape[1],
            self.shape[2]
        )
    }
}

// =============================================================================
// GRAPH RECORDS
// =============================================================================

/// A fragment as returned by a region query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub position: Position,
}

impl NodeRecord {
    /// Create a new node record.
    #[must_use]
    pub const fn new(id: NodeId, position: Position) -> Self {
        Self { id, position }
    }
}

/// An undirected candidate-merge edge as stored in the RAG.
///
/// `u` always references a node inside the queried region; `v` may reference a
/// boundary node outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub u: NodeId,
    pub v: NodeId,
    /// Agglomeration score predicted upstream.
    pub merge_score: f32,
    /// Ground-truth class of the edge (0 = merge, 1 = split).
    pub gt_label: f32,
    /// 1 if the edge takes part in the loss, 0 otherwise.
    pub labeled: f32,
}

impl EdgeRecord {
    /// Create a new edge record.
    #[must_use]
    pub const fn new(u: NodeId, v: NodeId, merge_score: f32, gt_label: f32, labeled: f32) -> Self {
        Self {
            u,
            v,
            merge_score,
            gt_label,
            labeled,
        }
    }
}

/// Per-edge attribute values, keyed in storage by the `(u, v)` endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub merge_score: f32,
    pub gt_label: f32,
    pub labeled: f32,
}

impl From<&EdgeRecord> for EdgeAttrs {
    fn from(edge: &EdgeRecord) -> Self {
        Self {
            merge_score: edge.merge_score,
            gt_label: edge.gt_label,
            labeled: edge.labeled,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Which edge-count guard rejected an excerpt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCountStage {
    /// Twice the raw undirected edge count, before any processing.
    Undirected,
    /// Final directed edge count, self-loops included.
    Directed,
}

impl fmt::Display for EdgeCountStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undirected => write!(f, "pre-expansion"),
            Self::Directed => write!(f, "post-expansion"),
        }
    }
}

/// Errors raised while reading, building or persisting graph excerpts.
///
/// Construction is all-or-nothing: every error aborts the excerpt.
#[derive(Debug, Error)]
pub enum ExcerptError {
    /// The region query returned no nodes or no edges.
    #[error("Empty region {region}: {nodes} nodes, {edges} edges")]
    EmptyRegion {
        region: Region,
        nodes: usize,
        edges: usize,
    },

    /// A boundary node could not be resolved by the full node lookup.
    #[error("Missing node: {id} is referenced by an edge but unknown to the node lookup")]
    MissingNode { id: NodeId },

    /// An edge's near endpoint is absent from the queried node set.
    #[error("Edge id integrity: near endpoint {id} is not part of the queried node set")]
    EdgeIntegrity { id: NodeId },

    /// An edge endpoint has no dense index.
    #[error("Unmapped id: {id} has no local index")]
    UnmappedId { id: NodeId },

    /// The directed edge count exceeds the configured cap.
    #[error("Too many edges ({stage}): extracted graph has {edges} edges, but the limit is set to {limit}")]
    TooManyEdges {
        edges: usize,
        limit: usize,
        stage: EdgeCountStage,
    },

    /// Class labels are not contiguous integers starting at 0.
    #[error("Unsupported label encoding: {0}")]
    UnsupportedLabelEncoding(String),

    /// Node embeddings disagree on their dimensionality.
    #[error("Embedding for node {id} has dimension {found}, expected {expected}")]
    EmbeddingDimension {
        id: NodeId,
        expected: usize,
        found: usize,
    },

    /// A constructed or decoded excerpt breaks a structural invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A raw record is missing a field or carries a wrongly typed value.
    #[error("Schema error in field '{field}': {reason}")]
    SchemaError { field: String, reason: String },

    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An edge label cannot be turned into a pair target.
    #[error("Value {value} cannot be transformed into a valid label")]
    InvalidLabel { value: f32 },

    /// A dataset index lies beyond the number of samples.
    #[error("Index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    /// The patch provider could not deliver volumes for a pair.
    #[error("Patch unavailable: {0}")]
    PatchUnavailable(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
