//! # Graph Excerpt
//!
//! The fully materialized training subgraph for one region. Built once by
//! the assembler and immutable afterwards.
//!
//! ## Invariants
//!
//! 1. The directed edge count is twice the undirected count (self-loops included).
//! 2. Slot `2k + 1` of `edge_index` is the reverse of slot `2k`.
//! 3. Every local index is `< N`.
//! 4. `N == node_ids.len() == positions.len() == feature rows`.
//! 5. The directed edge count does not exceed `max_edges`.

use crate::config::MaskStrategy;
use crate::directed::check_pairing;
use crate::{ExcerptError, NodeId, Region};
use serde::{Deserialize, Serialize};

/// A training subgraph in dense local index space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExcerpt {
    /// Region the excerpt was read from.
    pub region: Region,
    /// Sub-region used for masking.
    pub inner_region: Region,
    /// Masking variant the excerpt was built with.
    pub strategy: MaskStrategy,
    /// Whether the last `2 * N` directed edges are self-loops.
    pub self_loops: bool,
    /// Directed edge cap the excerpt was built under.
    pub max_edges: usize,

    /// Node features, row-major `N x feature_dim`.
    pub features: Vec<f32>,
    /// Width of one feature row.
    pub feature_dim: usize,
    /// Node positions `(z, y, x)`.
    pub positions: Vec<[f32; 3]>,
    /// Original fragment id of every local node.
    pub node_ids: Vec<NodeId>,

    /// Directed edges `(source, target)` in local index space.
    pub edge_index: Vec<[usize; 2]>,
    /// Merge score per directed edge.
    pub edge_attr: Vec<f32>,
    /// Ground-truth class per directed edge.
    pub targets: Vec<i64>,
    /// Class-balanced loss weight per directed edge.
    pub mask: Vec<f32>,
    /// 1 where the edge lies in the masking region.
    pub roi_mask: Vec<u8>,
}

impl GraphExcerpt {
    /// Number of nodes `N`.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    /// Number of directed edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    /// Feature row of local node `i`.
    #[must_use]
    pub fn feature_row(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.feature_dim)?;
        self.features.get(start..start.checked_add(self.feature_dim)?)
    }

    /// Global endpoint ids of every directed edge.
    #[must_use]
    pub fn global_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edge_index
            .iter()
            .filter_map(|&[u, v]| Some((*self.node_ids.get(u)?, *self.node_ids.get(v)?)))
            .collect()
    }

    /// Sum of the loss weights.
    #[must_use]
    pub fn mask_total(&self) -> f32 {
        self.mask.iter().sum()
    }

    /// Re-check every structural invariant.
    pub fn validate(&self) -> Result<(), ExcerptError> {
        let n = self.num_nodes();
        if self.positions.len() != n {
            return Err(violation(format!(
                "{} positions for {} nodes",
                self.positions.len(),
                n
            )));
        }
        let expected = n.checked_mul(self.feature_dim);
        if self.feature_dim == 0 || expected != Some(self.features.len()) {
            return Err(violation(format!(
                "{} feature values do not form {} rows of width {}",
                self.features.len(),
                n,
                self.feature_dim
            )));
        }

        let e = self.num_edges();
        for (name, len) in [
            ("edge_attr", self.edge_attr.len()),
            ("targets", self.targets.len()),
            ("mask", self.mask.len()),
            ("roi_mask", self.roi_mask.len()),
        ] {
            if len != e {
                return Err(violation(format!(
                    "{} has {} entries for {} directed edges",
                    name, len, e
                )));
            }
        }

        if let Some(edge) = self.edge_index.iter().find(|[u, v]| *u >= n || *v >= n) {
            return Err(violation(format!(
                "edge {:?} points outside {} nodes",
                edge, n
            )));
        }
        check_pairing(&self.edge_index)?;

        if self.self_loops {
            let loops = n * 2;
            if e < loops {
                return Err(violation(format!(
                    "{} directed edges cannot hold {} self-loop slots",
                    e, loops
                )));
            }
            let tail = &self.edge_index[e - loops..];
            for (slot, edge) in tail.iter().enumerate() {
                let node = slot / 2;
                let idx = e - loops + slot;
                if *edge != [node, node] || self.targets[idx] != 0 || self.mask[idx] != 0.0 {
                    return Err(violation(format!(
                        "self-loop slot {} holds {:?} (target {}, mask {})",
                        idx, edge, self.targets[idx], self.mask[idx]
                    )));
                }
            }
        }

        if e > self.max_edges {
            return Err(ExcerptError::TooManyEdges {
                edges: e,
                limit: self.max_edges,
                stage: crate::EdgeCountStage::Directed,
            });
        }
        Ok(())
    }
}

fn violation(message: String) -> ExcerptError {
    ExcerptError::InvariantViolation(message)
}
