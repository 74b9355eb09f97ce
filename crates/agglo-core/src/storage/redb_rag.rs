//! # redb-backed RAG Storage
//!
//! A disk-backed region adjacency graph using the redb embedded database.
//!
//! - ACID batch ingestion (one write transaction per batch)
//! - Region queries read from a single MVCC snapshot, so a concurrent ingest
//!   never yields a half-written excerpt
//! - Edges are keyed by `(u, v)`, which turns "all edges of node `u`" into a
//!   range scan
//! - Nodes are also indexed by a coarse grid cell, so a region query only
//!   touches the cells overlapping the region

use crate::graph::{NodeLookup, RagProvider};
use crate::{EdgeAttrs, EdgeRecord, ExcerptError, NodeId, NodeRecord, Position, Region};
use redb::{
    Database, ReadOnlyTable, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};
use std::path::Path;

/// Table for nodes: NodeId(u64) -> serialized Position bytes
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for edges: (u, v) -> serialized EdgeAttrs bytes
const EDGES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("edges");

/// Spatial index: (cell_z, cell_y, cell_x, NodeId) -> ()
const CELLS: TableDefinition<(i64, i64, i64, u64), ()> = TableDefinition::new("cells");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Layout version of the tables above.
const STORE_VERSION: u64 = 2;

/// Edge length of one spatial index cell, in world units.
const CELL_SIZE: i64 = 1024;

fn cell_of(position: &Position) -> [i64; 3] {
    position
        .to_array()
        .map(|p| (p / CELL_SIZE as f64).floor() as i64)
}

fn cell_key(position: &Position, id: u64) -> (i64, i64, i64, u64) {
    let [z, y, x] = cell_of(position);
    (z, y, x, id)
}

fn io_err(e: impl std::fmt::Display) -> ExcerptError {
    ExcerptError::IoError(e.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ExcerptError> {
    postcard::from_bytes(bytes).map_err(|e| ExcerptError::SerializationError(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ExcerptError> {
    postcard::to_allocvec(value).map_err(|e| ExcerptError::SerializationError(e.to_string()))
}

/// A region adjacency graph stored in redb.
pub struct RedbRag {
    db: Database,
}

impl std::fmt::Debug for RedbRag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRag").finish_non_exhaustive()
    }
}

impl RedbRag {
    /// Open or create a RAG database at the given path.
    ///
    /// Fails with `SerializationError` if the file was written with an
    /// incompatible table layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExcerptError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let _ = write_txn.open_table(EDGES).map_err(io_err)?;
            let _ = write_txn.open_table(CELLS).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            let stored = meta
                .get("store_version")
                .map_err(io_err)?
                .map(|v| v.value());
            match stored {
                Some(version) if version != STORE_VERSION => {
                    return Err(ExcerptError::SerializationError(format!(
                        "Unsupported store version: {} (expected {})",
                        version, STORE_VERSION
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert("store_version", STORE_VERSION)
                        .map_err(io_err)?;
                }
            }
        }
        write_txn.commit().map_err(io_err)?;

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), ExcerptError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    /// Insert nodes and edges in a single ACID transaction.
    ///
    /// Existing records with the same key are replaced, and a moved node leaves
    /// its old index cell. Edges are stored as given; their far endpoint does
    /// not need to exist yet.
    pub fn ingest_batch(
        &mut self,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
    ) -> Result<(), ExcerptError> {
        if nodes.is_empty() && edges.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut nodes_table = write_txn.open_table(NODES).map_err(io_err)?;
            let mut cells_table = write_txn.open_table(CELLS).map_err(io_err)?;
            for node in nodes {
                let bytes = encode(&node.position)?;
                let previous: Option<Position> = match nodes_table
                    .insert(node.id.0, bytes.as_slice())
                    .map_err(io_err)?
                {
                    Some(old) => Some(decode(old.value())?),
                    None => None,
                };
                if let Some(old) = previous {
                    cells_table
                        .remove(cell_key(&old, node.id.0))
                        .map_err(io_err)?;
                }
                cells_table
                    .insert(cell_key(&node.position, node.id.0), ())
                    .map_err(io_err)?;
            }

            let mut edges_table = write_txn.open_table(EDGES).map_err(io_err)?;
            for edge in edges {
                let bytes = encode(&EdgeAttrs::from(edge))?;
                edges_table
                    .insert((edge.u.0, edge.v.0), bytes.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;

        tracing::debug!(nodes = nodes.len(), edges = edges.len(), "ingested batch");
        Ok(())
    }

    /// Get the total number of nodes.
    pub fn node_count(&self) -> Result<usize, ExcerptError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    /// Get the total number of undirected edges.
    pub fn edge_count(&self) -> Result<usize, ExcerptError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(EDGES).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    /// Get all nodes in ascending id order.
    pub fn nodes(&self) -> Result<Vec<NodeRecord>, ExcerptError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;
        scan_nodes(&table)
    }
}

fn scan_nodes(table: &ReadOnlyTable<u64, &[u8]>) -> Result<Vec<NodeRecord>, ExcerptError> {
    let mut nodes = Vec::new();
    for entry in table.iter().map_err(io_err)? {
        let (key, value) = entry.map_err(io_err)?;
        nodes.push(NodeRecord::new(NodeId(key.value()), decode(value.value())?));
    }
    Ok(nodes)
}

// =============================================================================
// CAPABILITY IMPLEMENTATIONS
// =============================================================================

impl RagProvider for RedbRag {
    fn read_region(
        &self,
        region: &Region,
    ) -> Result<(Vec<NodeRecord>, Vec<EdgeRecord>), ExcerptError> {
        if region.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let read_txn = self.db.begin_read().map_err(io_err)?;
        let nodes_table = read_txn.open_table(NODES).map_err(io_err)?;
        let edges_table = read_txn.open_table(EDGES).map_err(io_err)?;
        let cells_table = read_txn.open_table(CELLS).map_err(io_err)?;

        let lo = region.offset.map(|o| o.div_euclid(CELL_SIZE));
        let hi = region.end().map(|e| (e - 1).div_euclid(CELL_SIZE));

        let mut nodes = Vec::new();
        for cz in lo[0]..=hi[0] {
            for cy in lo[1]..=hi[1] {
                let cells = cells_table
                    .range((cz, cy, lo[2], 0u64)..=(cz, cy, hi[2], u64::MAX))
                    .map_err(io_err)?;
                for entry in cells {
                    let (key, _) = entry.map_err(io_err)?;
                    let (_, _, _, id) = key.value();
                    let data = nodes_table.get(id).map_err(io_err)?.ok_or_else(|| {
                        ExcerptError::InvariantViolation(format!(
                            "spatial index refers to unknown node {}",
                            id
                        ))
                    })?;
                    let position: Position = decode(data.value())?;
                    if region.contains(&position) {
                        nodes.push(NodeRecord::new(NodeId(id), position));
                    }
                }
            }
        }
        nodes.sort_unstable_by_key(|n| n.id);

        let mut edges = Vec::new();
        for node in &nodes {
            let u = node.id.0;
            for entry in edges_table.range((u, 0u64)..=(u, u64::MAX)).map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                let (u, v) = key.value();
                let attrs: EdgeAttrs = decode(value.value())?;
                edges.push(EdgeRecord::new(
                    NodeId(u),
                    NodeId(v),
                    attrs.merge_score,
                    attrs.gt_label,
                    attrs.labeled,
                ));
            }
        }
        Ok((nodes, edges))
    }
}

impl NodeLookup for RedbRag {
    fn resolve(&self, id: NodeId) -> Result<Option<Position>, ExcerptError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;
        match table.get(id.0).map_err(io_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }
}
