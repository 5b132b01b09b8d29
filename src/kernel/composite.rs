//! Weighted sum and weighted product composites over minor kernels
//!
//! Minors are held in insertion order and identified by pointer
//! (`Arc::ptr_eq`): two structurally identical kernels are distinct entries.
//! A weight of exactly zero removes a minor from every computation.
//!
//! The weight table may be edited while another thread computes a matrix.
//! Each computation works on a snapshot taken when it starts.

use crate::core::{KernelMatrix, Result, SVMError, Sample};
use crate::kernel::{Kernel, ParametricKernel};
use crate::parallel::{join_all, ParallelOperator, ThreadPoolResource};
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Ordered `(kernel, weight)` entries behind a lock
struct WeightTable<K: ?Sized> {
    entries: RwLock<Vec<(Arc<K>, f64)>>,
}

impl<K: ?Sized> WeightTable<K> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, kernel: Arc<K>, weight: f64) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(k, _)| Arc::ptr_eq(k, &kernel)) {
            Some(entry) => entry.1 = weight,
            None => entries.push((kernel, weight)),
        }
    }

    fn remove(&self, kernel: &Arc<K>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(k, _)| !Arc::ptr_eq(k, kernel));
        entries.len() != before
    }

    fn set_weight(&self, kernel: &Arc<K>, weight: f64) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(k, _)| Arc::ptr_eq(k, kernel)) {
            Some(entry) => {
                entry.1 = weight;
                Ok(())
            }
            None => Err(SVMError::InvalidParameter(
                "kernel is not part of this composite".to_string(),
            )),
        }
    }

    fn weight(&self, kernel: &Arc<K>) -> Option<f64> {
        self.entries
            .read()
            .iter()
            .find(|(k, _)| Arc::ptr_eq(k, kernel))
            .map(|(_, w)| *w)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Snapshot of the entries with non-zero weight
    fn active(&self) -> Vec<(Arc<K>, f64)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(k, w)| (Arc::clone(k), *w))
            .collect()
    }
}

/// Run one pool task per minor; each computes its line, then folds it into
/// the shared output under the lock
fn per_kernel_line<K, F, G>(
    operator: &ParallelOperator,
    minors: &[(Arc<K>, f64)],
    init: f64,
    len: usize,
    line: F,
    fold: G,
) -> Result<Vec<f64>>
where
    K: ?Sized + Send + Sync,
    F: Fn(&K, f64) -> Result<Vec<f64>> + Sync,
    G: Fn(&mut f64, f64) + Sync,
{
    if minors.is_empty() || len == 0 {
        return Ok(vec![init; len]);
    }

    let output = Mutex::new(vec![init; len]);
    let pool = ThreadPoolResource::acquire_with(operator.config().pool)?;
    let outcome = pool.scope(|scope| {
        let handles: Vec<_> = minors
            .iter()
            .map(|(minor, weight)| {
                let (output, line, fold) = (&output, &line, &fold);
                scope.submit(move || -> Result<()> {
                    let values = line(minor.as_ref(), *weight)?;
                    let mut output = output.lock();
                    for (o, v) in output.iter_mut().zip(values) {
                        fold(o, v);
                    }
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    });
    let shutdown = pool.shutdown();

    outcome.and_then(|result| result)?;
    shutdown?;
    Ok(output.into_inner())
}

/// K(x, y) = Σ wₖ · Kₖ(x, y)
pub struct WeightedSumKernel<T> {
    table: WeightTable<dyn Kernel<T>>,
    operator: ParallelOperator,
}

impl<T> WeightedSumKernel<T> {
    /// Empty composite using the default parallel operator
    pub fn new() -> Self {
        Self::with_operator(ParallelOperator::default())
    }

    /// Empty composite using `operator` for matrix computations
    pub fn with_operator(operator: ParallelOperator) -> Self {
        Self {
            table: WeightTable::new(),
            operator,
        }
    }

    /// Builder form of [`add_kernel`](Self::add_kernel)
    pub fn with_kernel(self, kernel: Arc<dyn Kernel<T>>, weight: f64) -> Self {
        self.add_kernel(kernel, weight);
        self
    }

    /// Add a minor, or update its weight if this exact kernel is already present
    pub fn add_kernel(&self, kernel: Arc<dyn Kernel<T>>, weight: f64) {
        self.table.add(kernel, weight);
    }

    /// Remove a minor; returns whether it was present
    pub fn remove_kernel(&self, kernel: &Arc<dyn Kernel<T>>) -> bool {
        self.table.remove(kernel)
    }

    /// Change the weight of a minor already in the composite
    pub fn set_weight(&self, kernel: &Arc<dyn Kernel<T>>, weight: f64) -> Result<()> {
        self.table.set_weight(kernel, weight)
    }

    pub fn weight(&self, kernel: &Arc<dyn Kernel<T>>) -> Option<f64> {
        self.table.weight(kernel)
    }

    /// Number of minors, including zero-weighted ones
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WeightedSumKernel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sync> Kernel<T> for WeightedSumKernel<T> {
    fn compute(&self, x: &T, y: &T) -> f64 {
        self.table
            .entries
            .read()
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(k, w)| w * k.compute(x, y))
            .sum()
    }

    fn self_value(&self, x: &T) -> f64 {
        self.table
            .entries
            .read()
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(k, w)| w * k.self_value(x))
            .sum()
    }

    /// Accumulates each minor into the upper triangle, then mirrors it
    fn kernel_matrix(&self, samples: &[Sample<T>]) -> Result<KernelMatrix> {
        let minors = self.table.active();
        let n = samples.len();
        debug!(
            "Computing {n}x{n} weighted sum Gram matrix over {} kernels",
            minors.len()
        );

        let mut matrix = KernelMatrix::zeros(n);
        for (minor, weight) in &minors {
            matrix = self.operator.matrix(matrix, |rows, from, to| {
                for i in from..to {
                    let row = &mut rows[(i - from) * n..(i - from + 1) * n];
                    let xi = &samples[i].value;
                    for j in i..n {
                        row[j] += weight * minor.compute(xi, &samples[j].value);
                    }
                }
                Ok(())
            })?;
        }
        matrix.mirror_upper();

        Ok(matrix)
    }

    fn kernel_matrix_line(&self, x: &T, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        let minors = self.table.active();
        per_kernel_line(
            &self.operator,
            &minors,
            0.0,
            samples.len(),
            |minor, weight| {
                let values = minor.kernel_matrix_line(x, samples)?;
                Ok(values.into_iter().map(|v| weight * v).collect())
            },
            |o, v| *o += v,
        )
    }
}

/// K(x, y) = Π Kₖ(x, y; wₖ)
///
/// Each weight is passed to its minor through
/// [`ParametricKernel::compute_with`]; for Gaussian minors it is the
/// bandwidth, otherwise it acts as an exponent.
pub struct WeightedProductKernel<T> {
    table: WeightTable<dyn ParametricKernel<T>>,
    operator: ParallelOperator,
}

impl<T> WeightedProductKernel<T> {
    pub fn new() -> Self {
        Self::with_operator(ParallelOperator::default())
    }

    pub fn with_operator(operator: ParallelOperator) -> Self {
        Self {
            table: WeightTable::new(),
            operator,
        }
    }

    pub fn with_kernel(self, kernel: Arc<dyn ParametricKernel<T>>, weight: f64) -> Self {
        self.add_kernel(kernel, weight);
        self
    }

    pub fn add_kernel(&self, kernel: Arc<dyn ParametricKernel<T>>, weight: f64) {
        self.table.add(kernel, weight);
    }

    pub fn remove_kernel(&self, kernel: &Arc<dyn ParametricKernel<T>>) -> bool {
        self.table.remove(kernel)
    }

    pub fn set_weight(&self, kernel: &Arc<dyn ParametricKernel<T>>, weight: f64) -> Result<()> {
        self.table.set_weight(kernel, weight)
    }

    pub fn weight(&self, kernel: &Arc<dyn ParametricKernel<T>>) -> Option<f64> {
        self.table.weight(kernel)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WeightedProductKernel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sync> Kernel<T> for WeightedProductKernel<T> {
    fn compute(&self, x: &T, y: &T) -> f64 {
        self.table
            .entries
            .read()
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(k, w)| k.compute_with(x, y, *w))
            .product()
    }

    /// Element-wise products over the full matrix, one parallel pass per minor
    fn kernel_matrix(&self, samples: &[Sample<T>]) -> Result<KernelMatrix> {
        let minors = self.table.active();
        let n = samples.len();
        debug!(
            "Computing {n}x{n} weighted product Gram matrix over {} kernels",
            minors.len()
        );

        let mut matrix = KernelMatrix::filled(n, 1.0);
        for (minor, weight) in &minors {
            matrix = self.operator.matrix(matrix, |rows, from, to| {
                for i in from..to {
                    let row = &mut rows[(i - from) * n..(i - from + 1) * n];
                    let xi = &samples[i].value;
                    for (j, value) in row.iter_mut().enumerate() {
                        *value *= minor.compute_with(xi, &samples[j].value, *weight);
                    }
                }
                Ok(())
            })?;
        }

        Ok(matrix)
    }

    fn kernel_matrix_line(&self, x: &T, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        let minors = self.table.active();
        per_kernel_line(
            &self.operator,
            &minors,
            1.0,
            samples.len(),
            |minor, weight| {
                Ok(samples
                    .iter()
                    .map(|s| minor.compute_with(x, &s.value, weight))
                    .collect())
            },
            |o, v| *o *= v,
        )
    }
}
