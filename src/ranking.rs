//! Prediction ranking.
//!
//! Converts a raw classifier output vector into a descending-sorted list
//! of (class index, confidence) pairs. The output covers every input
//! index exactly once and its head is the global argmax. Ties keep their
//! index order only as an artifact of the stable sort; observers must not
//! depend on any particular tie order.

use crate::types::{Prediction, RankedClass};

/// Ranks a raw output vector by descending confidence.
///
/// An empty input yields an empty prediction (the degenerate-fusion case).
/// Non-finite confidences compare as equal, which keeps the sort total
/// without crashing on a misbehaving backend.
pub fn rank(values: &[f32]) -> Prediction {
    let mut entries: Vec<RankedClass> = values
        .iter()
        .enumerate()
        .map(|(index, &confidence)| RankedClass { index, confidence })
        .collect();

    entries.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Prediction::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_empty_is_empty() {
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn test_head_is_argmax_and_output_is_permutation() {
        let values = [0.1, 0.7, 0.1, 0.1];
        let ranked = rank(&values);

        assert_eq!(ranked.len(), values.len());
        assert_eq!(ranked.top().unwrap().index, 1);
        assert_eq!(ranked.top().unwrap().confidence, 0.7);

        // Every input index appears exactly once with its own value.
        let mut seen = vec![false; values.len()];
        for entry in ranked.entries() {
            assert!(!seen[entry.index]);
            seen[entry.index] = true;
            assert_eq!(entry.confidence, values[entry.index]);
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_descending_order() {
        let values = [0.05, 0.3, 0.9, 0.2, 0.4];
        let ranked = rank(&values);
        for pair in ranked.entries().windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_fourteen_class_vector() {
        let mut values = [0.01f32; 14];
        values[9] = 0.87;
        let ranked = rank(&values);
        assert_eq!(ranked.len(), 14);
        assert_eq!(ranked.top().unwrap().index, 9);
    }
}
