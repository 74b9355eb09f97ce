//! # Identifier Remapper
//!
//! Bijection between sparse global fragment ids and the dense local index
//! space `[0, N)` used by edge-index tensors.
//!
//! Lookups go through a hash table keyed by id, so remapping `E` endpoints
//! against `N` known ids costs O(E + N) rather than a scan per edge.

use crate::{ExcerptError, NodeId};
use rustc_hash::FxHashMap;

/// Dense index table for one excerpt's node set.
///
/// Local index `i` is the position of the id in the array the remapper was
/// built from.
#[derive(Debug, Clone, Default)]
pub struct IdRemapper {
    index: FxHashMap<NodeId, usize>,
    ids: Vec<NodeId>,
}

impl IdRemapper {
    /// Build the table from unique ids.
    ///
    /// Returns `InvariantViolation` if an id appears twice, since the mapping
    /// would no longer be a bijection.
    pub fn new(known_ids: &[NodeId]) -> Result<Self, ExcerptError> {
        let mut index = FxHashMap::default();
        index.reserve(known_ids.len());
        for (local, &id) in known_ids.iter().enumerate() {
            if index.insert(id, local).is_some() {
                return Err(ExcerptError::InvariantViolation(format!(
                    "node id {} appears more than once in the node set",
                    id
                )));
            }
        }
        Ok(Self {
            index,
            ids: known_ids.to_vec(),
        })
    }

    /// Number of known ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Global ids in local-index order.
    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// Local index of a global id.
    #[must_use]
    pub fn local(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Global id of a local index.
    #[must_use]
    pub fn global(&self, local: usize) -> Option<NodeId> {
        self.ids.get(local).copied()
    }

    /// Rewrite endpoint ids into local indices.
    ///
    /// Every endpoint must be known; the first unknown id aborts with
    /// `UnmappedId`.
    pub fn remap(&self, endpoints: &[NodeId]) -> Result<Vec<usize>, ExcerptError> {
        endpoints
            .iter()
            .map(|&id| self.local(id).ok_or(ExcerptError::UnmappedId { id }))
            .collect()
    }
}

/// One-shot remapping of `endpoints` against `known_ids`.
pub fn remap(endpoints: &[NodeId], known_ids: &[NodeId]) -> Result<Vec<usize>, ExcerptError> {
    IdRemapper::new(known_ids)?.remap(endpoints)
}
