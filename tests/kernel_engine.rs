//! Integration tests for kernels, composites and the parallel substrate

use approx::assert_relative_eq;
use rtsvm::parallel::{Chunking, ParallelConfig, ParallelOperator};
use rtsvm::{
    IndexedKernel, Kernel, LinearKernel, MatrixKernel, ParametricKernel, RbfKernel, Result,
    SVMError, Sample, SparseVector, WeightedProductKernel, WeightedSumKernel,
};
use std::sync::Arc;

fn spiral(n: usize) -> Vec<Sample<SparseVector>> {
    (0..n)
        .map(|i| {
            let t = i as f64 * 0.37;
            Sample::unlabeled(SparseVector::dense(&[t.cos() * t, t.sin() * t, (t * 0.5).sin()]))
        })
        .collect()
}

fn operators() -> Vec<ParallelOperator> {
    vec![
        ParallelOperator::default(),
        ParallelOperator::new(ParallelConfig::default().with_chunking(Chunking::Rows(4))),
        ParallelOperator::new(
            ParallelConfig::default()
                .with_chunking(Chunking::PerCpu)
                .with_threads(3),
        ),
    ]
}

fn sum_kernel(operator: ParallelOperator) -> WeightedSumKernel<SparseVector> {
    WeightedSumKernel::<SparseVector>::with_operator(operator)
        .with_kernel(Arc::new(RbfKernel::new(0.3)), 0.8)
        .with_kernel(Arc::new(LinearKernel::new()), 0.05)
        .with_kernel(Arc::new(RbfKernel::new(2.0)), 1.7)
}

#[test]
fn test_sum_matrix_is_symmetric_for_every_chunking() {
    let samples = spiral(41);
    for operator in operators() {
        let matrix = sum_kernel(operator)
            .kernel_matrix(&samples)
            .expect("matrix should build");
        assert_eq!(matrix.dim(), 41);
        assert!(matrix.is_symmetric(0.0));
    }
}

#[test]
fn test_sum_matrix_and_line_agree() {
    let samples = spiral(33);
    let kernel = sum_kernel(ParallelOperator::default());
    let matrix = kernel.kernel_matrix(&samples).expect("matrix should build");

    for (i, sample) in samples.iter().enumerate() {
        let line = kernel
            .kernel_matrix_line(&sample.value, &samples)
            .expect("line should build");
        for j in 0..samples.len() {
            assert_relative_eq!(matrix[(i, j)], line[j], epsilon = 1e-10);
        }
    }
}

#[test]
fn test_chunking_does_not_change_results() {
    let samples = spiral(29);
    let reference = sum_kernel(ParallelOperator::default())
        .kernel_matrix(&samples)
        .expect("matrix should build");

    for operator in operators() {
        let matrix = sum_kernel(operator)
            .kernel_matrix(&samples)
            .expect("matrix should build");
        assert_eq!(matrix, reference);
    }
}

#[test]
fn test_zero_weight_minor_leaves_matrix_unchanged() {
    let samples = spiral(25);
    let kernel = sum_kernel(ParallelOperator::default());
    let before = kernel.kernel_matrix(&samples).expect("matrix should build");

    kernel.add_kernel(Arc::new(RbfKernel::new(9.0)), 0.0);
    let after = kernel.kernel_matrix(&samples).expect("matrix should build");

    assert_eq!(before, after);
    assert_eq!(kernel.len(), 4);
}

#[test]
fn test_minor_removal_and_reweighting() {
    let samples = spiral(10);
    let rbf: Arc<dyn Kernel<SparseVector>> = Arc::new(RbfKernel::new(0.3));
    let kernel = WeightedSumKernel::<SparseVector>::new().with_kernel(Arc::clone(&rbf), 2.0);

    let doubled = kernel.kernel_matrix(&samples).expect("matrix should build");
    kernel.set_weight(&rbf, 1.0).expect("kernel is present");
    let single = rbf.kernel_matrix(&samples).expect("matrix should build");
    let reweighted = kernel.kernel_matrix(&samples).expect("matrix should build");

    for i in 0..samples.len() {
        for j in 0..samples.len() {
            assert_relative_eq!(doubled[(i, j)], 2.0 * single[(i, j)], epsilon = 1e-12);
            assert_relative_eq!(reweighted[(i, j)], single[(i, j)], epsilon = 1e-12);
        }
    }

    assert!(kernel.remove_kernel(&rbf));
    assert!(!kernel.remove_kernel(&rbf));
    let empty = kernel.kernel_matrix(&samples).expect("matrix should build");
    assert!(empty.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_product_of_gaussians_is_gaussian_of_summed_widths() {
    let samples = spiral(15);
    let a: Arc<dyn ParametricKernel<SparseVector>> = Arc::new(RbfKernel::unit_gamma());
    let b: Arc<dyn ParametricKernel<SparseVector>> = Arc::new(RbfKernel::unit_gamma());
    let product = WeightedProductKernel::<SparseVector>::new()
        .with_kernel(a, 0.2)
        .with_kernel(b, 0.05);
    let expected = RbfKernel::new(0.25);

    let matrix = product.kernel_matrix(&samples).expect("matrix should build");
    for i in 0..samples.len() {
        for j in 0..samples.len() {
            assert_relative_eq!(
                matrix[(i, j)],
                expected.compute(&samples[i].value, &samples[j].value),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_indexed_kernel_reproduces_composite() {
    let samples = spiral(37);
    let kernel = sum_kernel(ParallelOperator::default());
    let keys: Vec<String> = (0..samples.len()).map(|i| format!("sample-{i}")).collect();

    let indexed = IndexedKernel::build(
        &kernel,
        keys.iter().cloned().zip(samples.iter().map(|s| s.value.clone())),
    )
    .expect("index should build");

    assert_eq!(indexed.keys(), keys.as_slice());
    for (i, a) in keys.iter().enumerate() {
        for (j, b) in keys.iter().enumerate() {
            let exact = kernel.compute(&samples[i].value, &samples[j].value);
            let cached = indexed.value_of(a, b).expect("keys are indexed");
            assert_relative_eq!(cached, exact, epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

#[test]
fn test_indexed_kernel_as_kernel_over_keys() {
    let samples = spiral(12);
    let indexed = IndexedKernel::build(
        &RbfKernel::new(0.5),
        samples.iter().enumerate().map(|(i, s)| (i as u32, s.value.clone())),
    )
    .expect("index should build");

    let key_samples: Vec<Sample<u32>> = (0..12).map(Sample::unlabeled).collect();
    let matrix = indexed
        .kernel_matrix(&key_samples)
        .expect("matrix should build");

    assert!(matrix.is_symmetric(0.0));
    for i in 0..12 {
        assert_relative_eq!(matrix[(i, i)], 1.0, epsilon = 1e-6);
    }
    assert!(matches!(
        indexed.value_of(&0, &99),
        Err(SVMError::KeyNotFound(_))
    ));

    let with_unknown: Vec<Sample<u32>> = [3, 99].into_iter().map(Sample::unlabeled).collect();
    assert!(matches!(
        indexed.kernel_matrix(&with_unknown),
        Err(SVMError::KeyNotFound(_))
    ));
}

#[test]
fn test_matrix_kernel_round_trip_through_gram() {
    let samples = spiral(9);
    let gram = RbfKernel::new(0.4)
        .kernel_matrix(&samples)
        .expect("matrix should build");
    let by_index = MatrixKernel::new(gram.clone()).expect("matrix is symmetric");

    let indices: Vec<Sample<usize>> = (0..9).map(Sample::unlabeled).collect();
    assert_eq!(
        by_index.kernel_matrix(&indices).expect("matrix should build"),
        gram
    );
}

/// Minor kernel whose matrix line always fails
struct BrokenLine;

impl Kernel<SparseVector> for BrokenLine {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.dot(y)
    }

    fn kernel_matrix_line(
        &self,
        _x: &SparseVector,
        _samples: &[Sample<SparseVector>],
    ) -> Result<Vec<f64>> {
        Err(SVMError::ParallelFailure("line unavailable".to_string()))
    }
}

/// Minor kernel that panics on a specific input
struct PanicsOnOrigin;

impl Kernel<SparseVector> for PanicsOnOrigin {
    fn compute(&self, x: &SparseVector, _y: &SparseVector) -> f64 {
        assert!(x.norm() > 0.0, "origin is not allowed");
        1.0
    }
}

#[test]
fn test_failures_propagate_out_of_parallel_fills() {
    let samples = spiral(20);

    let broken = sum_kernel(ParallelOperator::default());
    broken.add_kernel(Arc::new(BrokenLine), 1.0);
    assert!(matches!(
        broken.kernel_matrix_line(&samples[3].value, &samples),
        Err(SVMError::ParallelFailure(_))
    ));

    // spiral(20)[0] is the origin
    let panicking =
        WeightedSumKernel::<SparseVector>::new().with_kernel(Arc::new(PanicsOnOrigin), 1.0);
    assert!(matches!(
        panicking.kernel_matrix(&samples),
        Err(SVMError::ParallelFailure(_))
    ));
}
