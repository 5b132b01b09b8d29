//! Kernel trait definitions

use crate::core::{KernelMatrix, Result, Sample};
use std::sync::Arc;

/// Kernel function trait
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid for SVM.
/// Implementations are pure functions of their inputs and of hyperparameters
/// fixed at construction, so they can be evaluated from many threads at once.
pub trait Kernel<T>: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &T, y: &T) -> f64;

    /// Self-similarity K(x, x), used for diagonals and normalization
    fn self_value(&self, x: &T) -> f64 {
        self.compute(x, x)
    }

    /// Gram matrix of all pairwise values over `samples`, in sample order
    fn kernel_matrix(&self, samples: &[Sample<T>]) -> Result<KernelMatrix> {
        let n = samples.len();
        let mut matrix = KernelMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                matrix[(i, j)] = self.compute(&samples[i].value, &samples[j].value);
            }
        }
        Ok(matrix)
    }

    /// Values K(x, s) for every sample `s`, in sample order
    fn kernel_matrix_line(&self, x: &T, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        Ok(samples.iter().map(|s| self.compute(x, &s.value)).collect())
    }
}

/// Kernel that can be evaluated with an explicit parameter
///
/// Product composites pass their per-kernel weight here instead of
/// mutating the kernel, so one kernel can serve several composites.
pub trait ParametricKernel<T>: Kernel<T> {
    /// K(x, y) under `parameter`; defaults to `K(x, y)^parameter`
    fn compute_with(&self, x: &T, y: &T, parameter: f64) -> f64 {
        self.compute(x, y).powf(parameter)
    }
}

impl<T, K: Kernel<T> + ?Sized> Kernel<T> for Arc<K> {
    fn compute(&self, x: &T, y: &T) -> f64 {
        (**self).compute(x, y)
    }

    fn self_value(&self, x: &T) -> f64 {
        (**self).self_value(x)
    }

    fn kernel_matrix(&self, samples: &[Sample<T>]) -> Result<KernelMatrix> {
        (**self).kernel_matrix(samples)
    }

    fn kernel_matrix_line(&self, x: &T, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        (**self).kernel_matrix_line(x, samples)
    }
}

impl<T, K: Kernel<T> + ?Sized> Kernel<T> for Box<K> {
    fn compute(&self, x: &T, y: &T) -> f64 {
        (**self).compute(x, y)
    }

    fn self_value(&self, x: &T) -> f64 {
        (**self).self_value(x)
    }

    fn kernel_matrix(&self, samples: &[Sample<T>]) -> Result<KernelMatrix> {
        (**self).kernel_matrix(samples)
    }

    fn kernel_matrix_line(&self, x: &T, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        (**self).kernel_matrix_line(x, samples)
    }
}

impl<T, K: ParametricKernel<T> + ?Sized> ParametricKernel<T> for Arc<K> {
    fn compute_with(&self, x: &T, y: &T, parameter: f64) -> f64 {
        (**self).compute_with(x, y, parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// |x - y| on integers, enough to exercise the default methods
    struct AbsDiff;

    impl Kernel<i64> for AbsDiff {
        fn compute(&self, x: &i64, y: &i64) -> f64 {
            (x - y).abs() as f64
        }
    }

    impl ParametricKernel<i64> for AbsDiff {}

    #[test]
    fn test_default_kernel_matrix() {
        let samples: Vec<_> = [1, 4, 6].into_iter().map(Sample::unlabeled).collect();
        let matrix = AbsDiff.kernel_matrix(&samples).expect("matrix should build");

        assert_eq!(matrix.row(0), &[0.0, 3.0, 5.0]);
        assert_eq!(matrix.row(2), &[5.0, 2.0, 0.0]);
    }

    #[test]
    fn test_default_line_and_self_value() {
        let samples: Vec<_> = [1, 4, 6].into_iter().map(Sample::unlabeled).collect();
        let line = AbsDiff.kernel_matrix_line(&10, &samples).expect("line should build");

        assert_eq!(line, vec![9.0, 6.0, 4.0]);
        assert_eq!(AbsDiff.self_value(&10), 0.0);
    }

    #[test]
    fn test_default_compute_with_is_power() {
        assert_eq!(AbsDiff.compute_with(&1, &4, 2.0), 9.0);
    }

    #[test]
    fn test_shared_pointers_forward() {
        let shared: Arc<dyn Kernel<i64>> = Arc::new(AbsDiff);
        let boxed: Box<dyn Kernel<i64>> = Box::new(AbsDiff);

        assert_eq!(shared.compute(&2, &7), 5.0);
        assert_eq!(boxed.compute(&2, &7), 5.0);
    }
}
