//! # Directed Edge Expander
//!
//! Message passing consumes directed edges, so every undirected edge `k` is
//! written twice: `(u_k, v_k)` at slot `2k` and `(v_k, u_k)` at slot `2k + 1`.
//! Attributes are copied unchanged into both slots.
//!
//! The interleaved layout is a contract for downstream consumers. Nothing may
//! sort or shuffle a directed list without keeping each reverse edge directly
//! after its forward edge; `check_pairing` verifies it.

use crate::ExcerptError;

/// Edge endpoints in local index space plus the per-edge attributes.
///
/// Used for both the undirected and the directed representation; all four
/// columns always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    /// `(source, target)` local indices.
    pub index: Vec<[usize; 2]>,
    /// Upstream merge score.
    pub merge_score: Vec<f32>,
    /// Ground-truth class id.
    pub label: Vec<i64>,
    /// Base training mask (before class balancing).
    pub mask: Vec<f32>,
}

impl EdgeList {
    /// Create an empty list with room for `capacity` edges.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: Vec::with_capacity(capacity),
            merge_score: Vec::with_capacity(capacity),
            label: Vec::with_capacity(capacity),
            mask: Vec::with_capacity(capacity),
        }
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the list holds no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append one edge.
    pub fn push(&mut self, edge: [usize; 2], merge_score: f32, label: i64, mask: f32) {
        self.index.push(edge);
        self.merge_score.push(merge_score);
        self.label.push(label);
        self.mask.push(mask);
    }

    /// Append all edges of `other`, keeping their order.
    pub fn append(&mut self, other: &mut Self) {
        self.index.append(&mut other.index);
        self.merge_score.append(&mut other.merge_score);
        self.label.append(&mut other.label);
        self.mask.append(&mut other.mask);
    }

    /// Verify that every attribute column matches the edge count.
    pub fn check_columns(&self) -> Result<(), ExcerptError> {
        let n = self.index.len();
        if self.merge_score.len() != n || self.label.len() != n || self.mask.len() != n {
            return Err(ExcerptError::InvariantViolation(format!(
                "edge columns disagree: {} edges, {} scores, {} labels, {} mask entries",
                n,
                self.merge_score.len(),
                self.label.len(),
                self.mask.len()
            )));
        }
        Ok(())
    }
}

/// Write every value twice, in place order.
#[must_use]
pub fn duplicate<T: Copy>(values: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for &value in values {
        out.push(value);
        out.push(value);
    }
    out
}

/// Interleave every edge with its reverse.
#[must_use]
pub fn expand_index(undirected: &[[usize; 2]]) -> Vec<[usize; 2]> {
    let mut out = Vec::with_capacity(undirected.len() * 2);
    for &[src, dst] in undirected {
        out.push([src, dst]);
        out.push([dst, src]);
    }
    out
}

/// Expand an undirected edge list into its directed form.
///
/// Self-loops are emitted twice as well, so the pairing holds for every slot.
pub fn expand(undirected: &EdgeList) -> Result<EdgeList, ExcerptError> {
    undirected.check_columns()?;
    Ok(EdgeList {
        index: expand_index(&undirected.index),
        merge_score: duplicate(&undirected.merge_score),
        label: duplicate(&undirected.label),
        mask: duplicate(&undirected.mask),
    })
}

/// Check that slot `2k + 1` is the reverse of slot `2k` for every `k`.
pub fn check_pairing(directed: &[[usize; 2]]) -> Result<(), ExcerptError> {
    if directed.len() % 2 != 0 {
        return Err(ExcerptError::InvariantViolation(format!(
            "directed edge count {} is odd",
            directed.len()
        )));
    }
    for (k, pair) in directed.chunks_exact(2).enumerate() {
        let [u, v] = pair[0];
        if pair[1] != [v, u] {
            return Err(ExcerptError::InvariantViolation(format!(
                "directed slot {} ({:?}) is not the reverse of slot {} ({:?})",
                2 * k + 1,
                pair[1],
                2 * k,
                pair[0]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_reverse() {
        let mut undirected = EdgeList::default();
        undirected.push([0, 1], 0.5, 1, 1.0);
        undirected.push([1, 3], 0.2, 0, 1.0);

        let directed = expand(&undirected).expect("expand");

        assert_eq!(directed.index, vec![[0, 1], [1, 0], [1, 3], [3, 1]]);
        assert_eq!(directed.merge_score, vec![0.5, 0.5, 0.2, 0.2]);
        assert_eq!(directed.label, vec![1, 1, 0, 0]);
        assert_eq!(directed.mask, vec![1.0, 1.0, 1.0, 1.0]);
        assert!(check_pairing(&directed.index).is_ok());
    }

    #[test]
    fn self_loop_emitted_twice() {
        assert_eq!(expand_index(&[[2, 2]]), vec![[2, 2], [2, 2]]);
    }

    #[test]
    fn permuted_list_fails_pairing() {
        let index = vec![[0, 1], [1, 3], [1, 0], [3, 1]];
        assert!(matches!(
            check_pairing(&index),
            Err(ExcerptError::InvariantViolation(_))
        ));
    }

    #[test]
    fn odd_length_fails_pairing() {
        assert!(check_pairing(&[[0, 1]]).is_err());
    }

    #[test]
    fn ragged_columns_rejected() {
        let mut list = EdgeList::default();
        list.push([0, 1], 0.1, 0, 1.0);
        list.mask.pop();
        assert!(expand(&list).is_err());
    }
}
