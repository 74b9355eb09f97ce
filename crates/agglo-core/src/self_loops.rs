//! # Self-Loop Augmenter
//!
//! One `(i, i)` edge per node with merge score 0, label 0 and mask 0: present
//! for message passing, never part of the supervised loss.

use crate::directed::EdgeList;

/// Self-loop edges for `node_count` nodes, in node order.
#[must_use]
pub fn self_loops(node_count: usize) -> EdgeList {
    let mut loops = EdgeList::with_capacity(node_count);
    for i in 0..node_count {
        loops.push([i, i], 0.0, 0, 0.0);
    }
    loops
}

/// Append self-loops to an undirected edge list.
pub fn add_self_loops(undirected: &mut EdgeList, node_count: usize) {
    let mut loops = self_loops(node_count);
    undirected.append(&mut loops);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_are_neutral() {
        let loops = self_loops(3);
        assert_eq!(loops.index, vec![[0, 0], [1, 1], [2, 2]]);
        assert!(loops.merge_score.iter().all(|&s| s == 0.0));
        assert!(loops.label.iter().all(|&l| l == 0));
        assert!(loops.mask.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn appended_after_existing_edges() {
        let mut edges = EdgeList::default();
        edges.push([0, 1], 0.9, 1, 1.0);
        add_self_loops(&mut edges, 2);

        assert_eq!(edges.index, vec![[0, 1], [0, 0], [1, 1]]);
        assert_eq!(edges.label, vec![1, 0, 0]);
        assert_eq!(edges.mask, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_nodes_no_loops() {
        assert!(self_loops(0).is_empty());
    }
}
