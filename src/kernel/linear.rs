//! Dot-product kernel

use crate::core::SparseVector;
use crate::kernel::{Kernel, ParametricKernel};

/// `K(x, y) = ⟨x, y⟩`
///
/// Its parametric form is the default power `⟨x, y⟩^p`, which makes it a
/// polynomial factor inside product composites.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel<SparseVector> for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.dot(y)
    }

    fn self_value(&self, x: &SparseVector) -> f64 {
        x.norm_squared()
    }
}

impl ParametricKernel<SparseVector> for LinearKernel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Sample;

    #[test]
    fn test_sparse_overlap_only() {
        let x = SparseVector::new(vec![0, 2, 4], vec![1.0, 2.0, 3.0]);
        let y = SparseVector::new(vec![1, 2, 3], vec![5.0, -1.5, 7.0]);

        assert_eq!(LinearKernel.compute(&x, &y), -3.0);
        assert_eq!(LinearKernel.self_value(&x), 14.0);
    }

    #[test]
    fn test_power_form() {
        let x = SparseVector::dense(&[1.0, 1.0]);
        let y = SparseVector::dense(&[2.0, 1.0]);

        assert_eq!(LinearKernel.compute_with(&x, &y, 2.0), 9.0);
        assert_eq!(LinearKernel.compute_with(&x, &y, 1.0), 3.0);
    }

    #[test]
    fn test_gram_matrix_diagonal_holds_squared_norms() {
        let samples: Vec<_> = [[3.0, 4.0], [1.0, 0.0]]
            .iter()
            .map(|v| Sample::unlabeled(SparseVector::dense(v)))
            .collect();
        let matrix = LinearKernel.kernel_matrix(&samples).expect("matrix should build");

        assert_eq!(matrix[(0, 0)], 25.0);
        assert_eq!(matrix[(1, 1)], 1.0);
        assert_eq!(matrix[(0, 1)], 3.0);
    }
}
