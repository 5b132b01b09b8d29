//! Pseudo-label seeding and pairwise swap search

use crate::core::{Label, NEGATIVE, POSITIVE};
use std::cmp::Ordering;

/// Indices sorted by `values` descending, ties broken by ascending index
fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| match values[b].total_cmp(&values[a]) {
        Ordering::Equal => a.cmp(&b),
        ordering => ordering,
    });
    order
}

/// Initial pseudo-labels: the `numplus` highest scores are positive
pub fn seed_labels(scores: &[f64], numplus: usize) -> Vec<Label> {
    let mut labels = vec![NEGATIVE; scores.len()];
    for &i in descending_order(scores).iter().take(numplus) {
        labels[i] = POSITIVE;
    }
    labels
}

/// Margin violation `1 - y * f(x)` of each pseudo-labeled sample
pub fn violation_scores(scores: &[f64], labels: &[Label]) -> Vec<f64> {
    scores
        .iter()
        .zip(labels)
        .map(|(&s, &y)| 1.0 - f64::from(y) * s)
        .collect()
}

/// First swappable pair in descending violation order
///
/// A pair qualifies when the two samples hold opposite labels, both
/// violations are positive, and the violations sum to more than 2.
/// Swapping such a pair turns the sum `e` into `4 - e`, which is smaller.
/// Non-finite violations never qualify.
pub fn find_swap(violations: &[f64], labels: &[Label]) -> Option<(usize, usize)> {
    let candidates: Vec<usize> = descending_order(violations)
        .into_iter()
        .filter(|&i| violations[i].is_finite() && violations[i] > 0.0)
        .collect();

    for (a, &i) in candidates.iter().enumerate() {
        for &j in &candidates[a + 1..] {
            if violations[i] + violations[j] <= 2.0 {
                break;
            }
            if labels[i] != labels[j] {
                return Some((i, j));
            }
        }
    }

    None
}
