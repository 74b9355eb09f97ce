//! # Graph Excerpt Assembler
//!
//! Composes the region query, boundary reconciliation, id remapping,
//! self-loops, directed expansion and class balancing into one all-or-nothing
//! operation.
//!
//! The only I/O happens through the capabilities handed to the assembler
//! (region query, node lookup, embeddings). No retries happen here; failures
//! propagate to the caller, who may pick a different region or abort.

use crate::balance::balance;
use crate::boundary::{check_near_endpoints, reconcile};
use crate::config::{ExcerptConfig, MaskStrategy};
use crate::directed::{EdgeList, expand};
use crate::excerpt::GraphExcerpt;
use crate::graph::{EmbeddingSource, NodeLookup, RagProvider};
use crate::primitives::PLACEHOLDER_FEATURE;
use crate::remap::IdRemapper;
use crate::self_loops::add_self_loops;
use crate::{EdgeCountStage, EdgeRecord, ExcerptError, NodeId, NodeRecord, Region};
use std::time::Instant;

/// Builds graph excerpts from a RAG store.
///
/// Holds only shared references; each `assemble` call is independent and
/// touches no shared mutable state.
pub struct Assembler<'a> {
    provider: &'a dyn RagProvider,
    lookup: &'a dyn NodeLookup,
    embeddings: Option<&'a dyn EmbeddingSource>,
    config: &'a ExcerptConfig,
}

impl std::fmt::Debug for Assembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("config", self.config)
            .field("embeddings", &self.embeddings.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Assembler<'a> {
    /// Create an assembler without embeddings (constant node features).
    #[must_use]
    pub fn new(
        provider: &'a dyn RagProvider,
        lookup: &'a dyn NodeLookup,
        config: &'a ExcerptConfig,
    ) -> Self {
        Self {
            provider,
            lookup,
            embeddings: None,
            config,
        }
    }

    /// Resolve node features from `embeddings`.
    #[must_use]
    pub fn with_embeddings(mut self, embeddings: &'a dyn EmbeddingSource) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// The configuration excerpts are built with.
    #[must_use]
    pub fn config(&self) -> &ExcerptConfig {
        self.config
    }

    /// Build the excerpt for `region`, using the region itself for masking.
    pub fn assemble(&self, region: &Region) -> Result<GraphExcerpt, ExcerptError> {
        self.assemble_with_inner(region, region)
    }

    /// Build the excerpt for `region`; `inner` is the sub-region used by the
    /// masked strategy.
    pub fn assemble_with_inner(
        &self,
        region: &Region,
        inner: &Region,
    ) -> Result<GraphExcerpt, ExcerptError> {
        let _span = tracing::debug_span!("assemble", region = %region).entered();
        self.config.validate()?;

        let start = Instant::now();
        let (nodes, edges) = self.provider.read_region(region)?;
        tracing::debug!(elapsed = ?start.elapsed(), "read region");

        build_excerpt(
            &nodes,
            &edges,
            self.lookup,
            self.embeddings,
            self.config,
            region,
            inner,
        )
    }
}

/// Build an excerpt from records that were already read from the store.
///
/// Performs every step after the region query, starting with the empty-region
/// and edge-cap checks on the records as read.
pub fn build_excerpt(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
    lookup: &dyn NodeLookup,
    embeddings: Option<&dyn EmbeddingSource>,
    config: &ExcerptConfig,
    region: &Region,
    inner: &Region,
) -> Result<GraphExcerpt, ExcerptError> {
    config.validate()?;

    if nodes.is_empty() || edges.is_empty() {
        return Err(ExcerptError::EmptyRegion {
            region: *region,
            nodes: nodes.len(),
            edges: edges.len(),
        });
    }

    // Every undirected edge becomes two directed edges.
    let doubled = edges.len().saturating_mul(2);
    if doubled > config.max_edges {
        return Err(ExcerptError::TooManyEdges {
            edges: doubled,
            limit: config.max_edges,
            stage: EdgeCountStage::Undirected,
        });
    }

    let start = Instant::now();
    let reconciled = reconcile(nodes, edges, lookup)?;
    tracing::debug!(
        added = reconciled.len() - nodes.len(),
        elapsed = ?start.elapsed(),
        "add missing nodes"
    );
    check_near_endpoints(nodes, edges)?;

    tracing::info!(
        nodes = reconciled.len(),
        edges = edges.len(),
        "parse graph"
    );

    let node_ids: Vec<NodeId> = reconciled.iter().map(|n| n.id).collect();
    let remapper = IdRemapper::new(&node_ids)?;
    let (features, feature_dim) = node_features(&node_ids, embeddings)?;

    let start = Instant::now();
    let mut undirected = undirected_edges(&remapper, edges)?;
    tracing::debug!(edges = undirected.len(), elapsed = ?start.elapsed(), "remap edges");

    if config.self_loops {
        add_self_loops(&mut undirected, reconciled.len());
        tracing::debug!(nodes = reconciled.len(), "add self loops");
    }

    let directed = expand(&undirected)?;
    if directed.len() > config.max_edges {
        return Err(ExcerptError::TooManyEdges {
            edges: directed.len(),
            limit: config.max_edges,
            stage: EdgeCountStage::Directed,
        });
    }

    let roi_mask = roi_mask(config.strategy, &directed, &reconciled, inner);
    let base_mask: Vec<f32> = directed
        .mask
        .iter()
        .zip(&roi_mask)
        .map(|(&m, &r)| m * f32::from(r))
        .collect();
    let start = Instant::now();
    let mask = balance(&directed.label, &base_mask)?;
    tracing::debug!(elapsed = ?start.elapsed(), "perform class balancing on mask");

    let excerpt = GraphExcerpt {
        region: *region,
        inner_region: *inner,
        strategy: config.strategy,
        self_loops: config.self_loops,
        max_edges: config.max_edges,
        features,
        feature_dim,
        positions: reconciled.iter().map(|n| n.position.to_f32()).collect(),
        node_ids,
        edge_index: directed.index,
        edge_attr: directed.merge_score,
        targets: directed.label,
        mask,
        roi_mask,
    };
    excerpt.validate()?;
    Ok(excerpt)
}

/// Interpret a ground-truth value as a class id.
fn class_id(value: f32) -> Result<i64, ExcerptError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(ExcerptError::UnsupportedLabelEncoding(format!(
            "ground-truth value {} is not a non-negative integer class",
            value
        )))
    }
}

fn undirected_edges(
    remapper: &IdRemapper,
    edges: &[EdgeRecord],
) -> Result<EdgeList, ExcerptError> {
    let us: Vec<NodeId> = edges.iter().map(|e| e.u).collect();
    let vs: Vec<NodeId> = edges.iter().map(|e| e.v).collect();
    let us = remapper.remap(&us)?;
    let vs = remapper.remap(&vs)?;

    let mut list = EdgeList::with_capacity(edges.len());
    for ((edge, u), v) in edges.iter().zip(us).zip(vs) {
        list.push([u, v], edge.merge_score, class_id(edge.gt_label)?, edge.labeled);
    }
    Ok(list)
}

/// Feature rows in node order, or a constant column if any embedding is
/// unavailable.
fn node_features(
    node_ids: &[NodeId],
    embeddings: Option<&dyn EmbeddingSource>,
) -> Result<(Vec<f32>, usize), ExcerptError> {
    let placeholder = || (vec![PLACEHOLDER_FEATURE; node_ids.len()], 1);
    let Some(source) = embeddings else {
        return Ok(placeholder());
    };

    let start = Instant::now();
    let mut features = Vec::new();
    let mut dim = None;
    for &id in node_ids {
        let Some(vector) = source.lookup(id) else {
            tracing::warn!(node = %id, "no embedding for node, using constant features");
            return Ok(placeholder());
        };
        let expected = *dim.get_or_insert(vector.len());
        if vector.is_empty() || vector.len() != expected {
            return Err(ExcerptError::EmbeddingDimension {
                id,
                expected: expected.max(1),
                found: vector.len(),
            });
        }
        if features.is_empty() {
            features.reserve(expected * node_ids.len());
        }
        features.extend_from_slice(&vector);
    }
    tracing::debug!(elapsed = ?start.elapsed(), "load embeddings");
    Ok((features, dim.unwrap_or(1)))
}

fn roi_mask(
    strategy: MaskStrategy,
    directed: &EdgeList,
    nodes: &[NodeRecord],
    inner: &Region,
) -> Vec<u8> {
    match strategy {
        MaskStrategy::Unmasked => vec![1; directed.len()],
        MaskStrategy::Masked => directed
            .index
            .iter()
            .map(|&[src, _]| {
                u8::from(
                    nodes
                        .get(src)
                        .is_some_and(|n| inner.contains(&n.position)),
                )
            })
            .collect(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
