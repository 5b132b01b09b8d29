//! Kernel over sample indices backed by a user-supplied Gram matrix

use crate::core::{KernelMatrix, Result, SVMError};
use crate::kernel::Kernel;

/// Kernel whose inputs are row/column indices into a fixed matrix
///
/// Useful when the Gram matrix comes from outside the crate, e.g. a
/// string or graph kernel computed elsewhere.
#[derive(Debug, Clone)]
pub struct MatrixKernel {
    matrix: KernelMatrix,
}

impl MatrixKernel {
    /// Wrap a square matrix; fails if it is not symmetric within `1e-9`
    pub fn new(matrix: KernelMatrix) -> Result<Self> {
        if !matrix.is_symmetric(1e-9) {
            return Err(SVMError::InvalidParameter(
                "kernel matrix must be symmetric".to_string(),
            ));
        }
        Ok(Self { matrix })
    }

    /// Number of indexable samples
    pub fn size(&self) -> usize {
        self.matrix.dim()
    }

    pub fn matrix(&self) -> &KernelMatrix {
        &self.matrix
    }
}

impl Kernel<usize> for MatrixKernel {
    /// # Panics
    /// Panics if either index is out of range.
    fn compute(&self, x: &usize, y: &usize) -> f64 {
        let n = self.matrix.dim();
        assert!(*x < n && *y < n, "Index out of range for {n}x{n} kernel matrix");
        self.matrix[(*x, *y)]
    }
}
