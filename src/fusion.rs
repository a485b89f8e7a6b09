//! Dual-sensor prediction fusion.
//!
//! When both devices stream concurrently, their independent 14-class
//! output vectors are combined element-wise by arithmetic mean. If either
//! vector is empty the fusion degenerates to an empty result; downstream
//! ranking and publishing tolerate the empty vector, so this is a defined
//! outcome rather than an error.

use log::debug;

/// Element-wise mean of two confidence vectors.
///
/// `fused[i] = (a[i] + b[i]) / 2`. Empty input on either side yields an
/// empty vector, as does a length mismatch between non-empty inputs
/// (which indicates mismatched taxonomies and is logged).
pub fn fuse_mean(a: &[f32], b: &[f32]) -> Vec<f32> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    if a.len() != b.len() {
        debug!(
            "refusing to fuse confidence vectors of different lengths: {} vs {}",
            a.len(),
            b.len()
        );
        return Vec::new();
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x + y) / 2.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_averages_elementwise() {
        let a = [0.2, 0.4, 0.6, 0.8];
        let b = [0.4, 0.2, 0.6, 0.0];
        assert_eq!(fuse_mean(&a, &b), vec![0.3, 0.3, 0.6, 0.4]);
    }

    #[test]
    fn test_fuse_is_commutative() {
        let a = [0.15, 0.05, 0.5, 0.3];
        let b = [0.25, 0.35, 0.1, 0.3];
        assert_eq!(fuse_mean(&a, &b), fuse_mean(&b, &a));
    }

    #[test]
    fn test_empty_input_yields_empty() {
        let some = [0.5, 0.5];
        assert!(fuse_mean(&[], &some).is_empty());
        assert!(fuse_mean(&some, &[]).is_empty());
        assert!(fuse_mean(&[], &[]).is_empty());
    }

    #[test]
    fn test_length_mismatch_yields_empty() {
        let a = [0.5, 0.5];
        let b = [0.2, 0.3, 0.5];
        assert!(fuse_mean(&a, &b).is_empty());
    }

    #[test]
    fn test_fusing_with_zeros_halves_confidences() {
        // A fresh engine fuses against an all-zero peer vector.
        let live = [0.4, 0.6];
        let silent = [0.0, 0.0];
        assert_eq!(fuse_mean(&live, &silent), vec![0.2, 0.3]);
    }
}
