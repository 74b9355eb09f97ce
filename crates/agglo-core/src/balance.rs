//! # Class-Balance Weighter
//!
//! Inverse-frequency reweighting of a training mask. Among the entries selected
//! by the base mask, class `c` with relative frequency `f_c` receives weight
//! `1 / (f_c * K)` where `K` is the number of distinct classes present, so
//! every class contributes the same total weight.
//!
//! Classes must be contiguous integers starting at 0.

use crate::ExcerptError;
use std::collections::BTreeMap;

fn class_counts<'a>(labels: impl Iterator<Item = &'a i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    counts
}

fn check_contiguous(counts: &BTreeMap<i64, usize>) -> Result<(), ExcerptError> {
    let first = counts.keys().next().copied();
    let last = counts.keys().next_back().copied();
    match (first, last) {
        (Some(0), Some(max)) if max == counts.len() as i64 - 1 => Ok(()),
        _ => Err(ExcerptError::UnsupportedLabelEncoding(format!(
            "weight balancing only for contiguous labels starting at 0, found {:?}",
            counts.keys().collect::<Vec<_>>()
        ))),
    }
}

/// Reweight `base_mask` so that every class present among the masked entries
/// carries equal total weight.
///
/// - Unmasked entries (`base_mask == 0`) are always 0 in the output.
/// - With fewer than two classes among masked entries the base mask is
///   returned unchanged.
/// - Non-contiguous or negative labels fail with `UnsupportedLabelEncoding`.
pub fn balance(labels: &[i64], base_mask: &[f32]) -> Result<Vec<f32>, ExcerptError> {
    if labels.len() != base_mask.len() {
        return Err(ExcerptError::InvariantViolation(format!(
            "{} labels for {} mask entries",
            labels.len(),
            base_mask.len()
        )));
    }

    let counts = class_counts(
        labels
            .iter()
            .zip(base_mask)
            .filter(|(_, m)| **m != 0.0)
            .map(|(l, _)| l),
    );
    tracing::debug!(?counts, "class counts among masked edges");

    if counts.len() <= 1 {
        tracing::debug!("only one class in excerpt, no reweighting performed");
        return Ok(base_mask.to_vec());
    }
    check_contiguous(&counts)?;

    let total: usize = counts.values().sum();
    let classes = counts.len() as f64;
    let weights: BTreeMap<i64, f32> = counts
        .iter()
        .map(|(&class, &count)| {
            let frequency = count as f64 / total as f64;
            (class, (1.0 / (frequency * classes)) as f32)
        })
        .collect();

    Ok(labels
        .iter()
        .zip(base_mask)
        .map(|(label, &mask)| {
            if mask == 0.0 {
                0.0
            } else {
                weights.get(label).map_or(0.0, |w| mask * w)
            }
        })
        .collect())
}

/// Per-sample weights `1 / count(class)` for weighted random sampling.
///
/// Labels must be non-negative; classes that never occur are simply absent.
pub fn sample_weights(labels: &[i64]) -> Result<Vec<f32>, ExcerptError> {
    let counts = class_counts(labels.iter());
    if let Some(&negative) = counts.keys().next().filter(|&&l| l < 0) {
        return Err(ExcerptError::UnsupportedLabelEncoding(format!(
            "class labels must be non-negative, found {}",
            negative
        )));
    }
    Ok(labels
        .iter()
        .map(|label| counts.get(label).map_or(0.0, |&c| 1.0 / c as f32))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn three_to_two_ratio() {
        let weighted = balance(&[0, 0, 1, 1, 1], &[1.0; 5]).expect("balance");
        assert!(approx(weighted[0], 1.25));
        assert!(approx(weighted[1], 1.25));
        assert!(approx(weighted[2], 1.0 / 1.2));
        assert!(approx(weighted[0] / weighted[2], 1.5));
    }

    #[test]
    fn class_totals_equal() {
        let labels = [0, 1, 1, 1, 1, 1, 1, 0, 1];
        let weighted = balance(&labels, &[1.0; 9]).expect("balance");
        let total0: f32 = labels.iter().zip(&weighted).filter(|(l, _)| **l == 0).map(|(_, w)| w).sum();
        let total1: f32 = labels.iter().zip(&weighted).filter(|(l, _)| **l == 1).map(|(_, w)| w).sum();
        assert!(approx(total0, total1));
    }

    #[test]
    fn single_class_returns_base_mask() {
        let mask = [1.0, 0.0, 1.0, 1.0];
        let weighted = balance(&[1, 0, 1, 1], &mask).expect("balance");
        assert_eq!(weighted, mask.to_vec());
    }

    #[test]
    fn nothing_masked_returns_base_mask() {
        let weighted = balance(&[0, 1], &[0.0, 0.0]).expect("balance");
        assert_eq!(weighted, vec![0.0, 0.0]);
    }

    #[test]
    fn unmasked_entries_are_zero() {
        let weighted = balance(&[0, 1, 1, 5], &[1.0, 1.0, 0.0, 0.0]).expect("balance");
        assert_eq!(weighted[2], 0.0);
        assert_eq!(weighted[3], 0.0);
        assert!(approx(weighted[0], 1.0));
    }

    #[test]
    fn non_contiguous_labels_rejected() {
        let result = balance(&[0, 2, 2], &[1.0; 3]);
        assert!(matches!(
            result,
            Err(ExcerptError::UnsupportedLabelEncoding(_))
        ));
    }

    #[test]
    fn labels_not_starting_at_zero_rejected() {
        assert!(balance(&[1, 2], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(matches!(
            balance(&[0, 1], &[1.0]),
            Err(ExcerptError::InvariantViolation(_))
        ));
    }

    #[test]
    fn sample_weights_single_class() {
        let weights = sample_weights(&[1, 1]).expect("weights");
        assert!(approx(weights[0], 0.5));
    }

    #[test]
    fn sample_weights_negative_rejected() {
        assert!(sample_weights(&[-1, 0]).is_err());
    }

    #[test]
    fn sample_weights_inverse_count() {
        let weights = sample_weights(&[0, 1, 1, 1]).expect("weights");
        assert!(approx(weights[0], 1.0));
        assert!(approx(weights[1], 1.0 / 3.0));
    }
}
