//! # agglo-core
//!
//! Graph excerpt extraction for GNN-based fragment agglomeration.
//!
//! Given a region adjacency graph (RAG) of over-segmented fragments, this
//! crate turns a bounded region of it into a self-contained training
//! subgraph: a dense node index space, directed paired edges, optional
//! self-loops, class-balanced loss weights and a boundary-aware node set.
//!
//! ## Pipeline
//!
//! 1. Region query (`RagProvider`)
//! 2. Boundary reconciliation: far endpoints are resolved via `NodeLookup`
//! 3. Id remapping into `0..N`
//! 4. Optional self-loops, then directed expansion
//! 5. Class balancing of the label mask
//!
//! ## Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - All-or-nothing: an excerpt is either complete and valid or an error
//! - Deterministic: the same store contents and region give the same excerpt

// =============================================================================
// MODULES
// =============================================================================

pub mod assembler;
pub mod balance;
pub mod boundary;
pub mod config;
pub mod dataset;
pub mod directed;
pub mod excerpt;
pub mod formats;
pub mod graph;
pub mod pairs;
pub mod primitives;
pub mod remap;
pub mod schema;
pub mod self_loops;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EdgeAttrs, EdgeCountStage, EdgeRecord, ExcerptError, NodeId, NodeRecord, Position, Region,
};

// =============================================================================
// RE-EXPORTS: Excerpt Construction
// =============================================================================

pub use assembler::{Assembler, build_excerpt};
pub use balance::{balance, sample_weights};
pub use boundary::{check_near_endpoints, missing_endpoints, reconcile};
pub use config::{ExcerptConfig, MaskStrategy};
pub use directed::{EdgeList, expand};
pub use excerpt::GraphExcerpt;
pub use graph::{EmbeddingSource, EmbeddingTable, MemoryRag, NodeLookup, RagProvider};
pub use remap::IdRemapper;
pub use schema::{Document, EdgeSchema, edges_from_documents, nodes_from_documents};
pub use self_loops::add_self_loops;
pub use storage::RedbRag;

// =============================================================================
// RE-EXPORTS: Datasets
// =============================================================================

pub use dataset::{BlockSampler, ExcerptDataset, TargetStats};
pub use pairs::{
    ChannelConfig, PairDataset, PairPatches, PairSample, Patch, PatchConfig, PatchProvider,
    PatchRequest, VolumePair,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

#[cfg(feature = "crypto-hash")]
pub use formats::excerpt_digest;
pub use formats::{PersistenceHeader, excerpt_from_bytes, excerpt_to_bytes};
