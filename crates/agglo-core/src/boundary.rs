//! # Boundary Node Reconciler
//!
//! Region queries return nodes strictly inside the box, but edges whose far
//! endpoint `v` lies just outside of it. Those endpoints are pulled into the
//! excerpt as position-only nodes instead of dropping the edge, which would
//! bias training toward interior topology.

use crate::graph::NodeLookup;
use crate::{EdgeRecord, ExcerptError, NodeId, NodeRecord};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

/// Far endpoints not present in `nodes`, deduplicated and in ascending order.
#[must_use]
pub fn missing_endpoints(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Vec<NodeId> {
    let known: FxHashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    edges
        .iter()
        .map(|e| e.v)
        .filter(|v| !known.contains(v))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Extend `nodes` with a synthesized record for every dangling far endpoint.
///
/// The original records keep their order; synthesized ones are appended in
/// ascending id order. Every missing id must resolve through `lookup`,
/// otherwise the whole call fails with `MissingNode`.
///
/// Reconciling an already reconciled node set returns it unchanged.
pub fn reconcile<L: NodeLookup + ?Sized>(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
    lookup: &L,
) -> Result<Vec<NodeRecord>, ExcerptError> {
    let missing = missing_endpoints(nodes, edges);

    let mut extended = Vec::with_capacity(nodes.len() + missing.len());
    extended.extend_from_slice(nodes);
    for id in missing {
        tracing::debug!(node = %id, "append boundary node");
        let position = lookup.resolve(id)?.ok_or(ExcerptError::MissingNode { id })?;
        extended.push(NodeRecord::new(id, position));
    }
    Ok(extended)
}

/// Check that every near endpoint `u` is part of the queried node set.
pub fn check_near_endpoints(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
) -> Result<(), ExcerptError> {
    let known: FxHashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    match edges.iter().find(|e| !known.contains(&e.u)) {
        Some(edge) => Err(ExcerptError::EdgeIntegrity { id: edge.u }),
        None => Ok(()),
    }
}
