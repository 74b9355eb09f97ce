//! # Graph Capabilities
//!
//! The capabilities excerpt construction consumes from its collaborators,
//! plus in-memory implementations.
//!
//! - `RagProvider`: bounded-region query against the RAG store
//! - `NodeLookup`: full node lookup used for boundary reconciliation
//! - `EmbeddingSource`: per-node feature vectors
//!
//! Implementations may block on I/O; the core performs no retries.

use crate::{EdgeAttrs, EdgeRecord, ExcerptError, NodeId, NodeRecord, Position, Region};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// CAPABILITY TRAITS
// =============================================================================

/// Bounded-region query against a region adjacency graph.
pub trait RagProvider {
    /// Nodes whose position lies in `region`, and every edge whose near
    /// endpoint `u` is one of those nodes.
    fn read_region(
        &self,
        region: &Region,
    ) -> Result<(Vec<NodeRecord>, Vec<EdgeRecord>), ExcerptError>;
}

/// Resolve the position of any node in the full graph.
pub trait NodeLookup {
    /// `Ok(None)` if the id is unknown.
    fn resolve(&self, id: NodeId) -> Result<Option<Position>, ExcerptError>;
}

/// Source of per-node feature vectors.
pub trait EmbeddingSource {
    /// Feature vector of `id`, or `None` if the source has none.
    fn lookup(&self, id: NodeId) -> Option<Vec<f32>>;
}

// =============================================================================
// IN-MEMORY RAG
// =============================================================================

/// An in-memory region adjacency graph.
///
/// Uses `BTreeMap` so region queries return nodes in ascending id order and
/// edges in ascending `(u, v)` order.
#[derive(Debug, Clone, Default)]
pub struct MemoryRag {
    nodes: BTreeMap<NodeId, Position>,
    edges: BTreeMap<(NodeId, NodeId), EdgeAttrs>,
}

impl MemoryRag {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from records. Later duplicates replace earlier ones.
    #[must_use]
    pub fn from_records(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert_node(node);
        }
        for edge in edges {
            graph.insert_edge(edge);
        }
        graph
    }

    /// Insert or replace a node.
    pub fn insert_node(&mut self, node: NodeRecord) {
        self.nodes.insert(node.id, node.position);
    }

    /// Insert or replace an edge, keyed by `(u, v)`.
    pub fn insert_edge(&mut self, edge: EdgeRecord) {
        self.edges.insert((edge.u, edge.v), EdgeAttrs::from(&edge));
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl RagProvider for MemoryRag {
    fn read_region(
        &self,
        region: &Region,
    ) -> Result<(Vec<NodeRecord>, Vec<EdgeRecord>), ExcerptError> {
        let nodes: Vec<NodeRecord> = self
            .nodes
            .iter()
            .filter(|(_, position)| region.contains(position))
            .map(|(&id, &position)| NodeRecord::new(id, position))
            .collect();

        let mut edges = Vec::new();
        for node in &nodes {
            let range = (node.id, NodeId(0))..=(node.id, NodeId(u64::MAX));
            for (&(u, v), attrs) in self.edges.range(range) {
                edges.push(EdgeRecord::new(
                    u,
                    v,
                    attrs.merge_score,
                    attrs.gt_label,
                    attrs.labeled,
                ));
            }
        }
        Ok((nodes, edges))
    }
}

impl NodeLookup for MemoryRag {
    fn resolve(&self, id: NodeId) -> Result<Option<Position>, ExcerptError> {
        Ok(self.nodes.get(&id).copied())
    }
}

// =============================================================================
// EMBEDDING TABLE
// =============================================================================

/// Node embeddings held in memory, keyed by fragment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTable {
    vectors: BTreeMap<u64, Vec<f32>>,
}

impl EmbeddingTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the embedding of a node.
    pub fn insert(&mut self, id: NodeId, vector: Vec<f32>) {
        self.vectors.insert(id.0, vector);
    }

    /// Number of embedded nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Parse a JSON object mapping ids (as strings) to vectors.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ExcerptError> {
        let raw: BTreeMap<String, Vec<f32>> = serde_json::from_slice(bytes)
            .map_err(|e| ExcerptError::SerializationError(e.to_string()))?;
        let mut table = Self::new();
        for (key, vector) in raw {
            let id = key.parse::<u64>().map_err(|e| ExcerptError::SchemaError {
                field: key.clone(),
                reason: format!("embedding key is not a node id: {}", e),
            })?;
            table.insert(NodeId(id), vector);
        }
        Ok(table)
    }
}

impl EmbeddingSource for EmbeddingTable {
    fn lookup(&self, id: NodeId) -> Option<Vec<f32>> {
        self.vectors.get(&id.0).cloned()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn node(id: u64, p: f64) -> NodeRecord {
        NodeRecord::new(NodeId(id), Position::new(p, p, p))
    }

    fn edge(u: u64, v: u64) -> EdgeRecord {
        EdgeRecord::new(NodeId(u), NodeId(v), 0.1, 0.0, 1.0)
    }

    #[test]
    fn region_query_returns_inside_nodes_and_their_edges() {
        let rag = MemoryRag::from_records(
            vec![node(1, 1.0), node(2, 2.0), node(3, 50.0)],
            vec![edge(1, 2), edge(2, 3), edge(3, 1)],
        );

        let (nodes, edges) = rag
            .read_region(&Region::new([0, 0, 0], [10, 10, 10]))
            .expect("query");

        let ids: Vec<u64> = nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        let pairs: Vec<(u64, u64)> = edges.iter().map(|e| (e.u.0, e.v.0)).collect();
        // (3, 1) has its near endpoint outside the region
        assert_eq!(pairs, vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn lookup_resolves_any_node() {
        let rag = MemoryRag::from_records(vec![node(7, 70.0)], Vec::new());
        assert_eq!(
            rag.resolve(NodeId(7)).expect("resolve"),
            Some(Position::new(70.0, 70.0, 70.0))
        );
        assert_eq!(rag.resolve(NodeId(8)).expect("resolve"), None);
    }

    #[test]
    fn embeddings_from_json() {
        let table = EmbeddingTable::from_json(br#"{"5": [0.5, 1.5], "12": [2.0, 3.0]}"#)
            .expect("parse");
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(NodeId(12)), Some(vec![2.0, 3.0]));
        assert_eq!(table.lookup(NodeId(6)), None);
    }

    #[test]
    fn embeddings_bad_key_rejected() {
        let result = EmbeddingTable::from_json(br#"{"abc": [1.0]}"#);
        assert!(matches!(result, Err(ExcerptError::SchemaError { .. })));
    }
}
