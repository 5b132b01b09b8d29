//! Precomputed Gram matrix over a closed set of keyed samples
//!
//! The whole matrix is computed once, in parallel, when the kernel is built.
//! Lookups afterwards are O(1). Values are stored in single precision.

use crate::core::{KernelMatrix, Result, SVMError, Sample};
use crate::kernel::Kernel;
use crate::parallel::ParallelOperator;
use log::debug;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Kernel over opaque keys, backed by a precomputed Gram matrix
///
/// Keys receive dense indices in the order they are supplied to
/// [`build`](Self::build). Only keys present at build time can be queried.
#[derive(Debug, Clone)]
pub struct IndexedKernel<K> {
    index: HashMap<K, usize>,
    keys: Vec<K>,
    values: Vec<f32>,
}

impl<K> IndexedKernel<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Precompute `kernel` over `entries` using the default parallel operator
    pub fn build<T, KE, I>(kernel: &KE, entries: I) -> Result<Self>
    where
        T: Sync,
        KE: Kernel<T> + ?Sized,
        I: IntoIterator<Item = (K, T)>,
    {
        Self::build_with(kernel, entries, &ParallelOperator::default())
    }

    /// Precompute `kernel` over `entries` with an explicit operator
    ///
    /// Fails with [`SVMError::InvalidDataset`] on duplicate keys and with
    /// [`SVMError::ParallelFailure`] if the parallel fill fails.
    pub fn build_with<T, KE, I>(
        kernel: &KE,
        entries: I,
        operator: &ParallelOperator,
    ) -> Result<Self>
    where
        T: Sync,
        KE: Kernel<T> + ?Sized,
        I: IntoIterator<Item = (K, T)>,
    {
        let mut index = HashMap::new();
        let mut keys = Vec::new();
        let mut samples = Vec::new();

        for (key, sample) in entries {
            if index.contains_key(&key) {
                return Err(SVMError::InvalidDataset(format!(
                    "duplicate key {key:?} in kernel index"
                )));
            }
            index.insert(key.clone(), keys.len());
            keys.push(key);
            samples.push(sample);
        }

        let n = samples.len();
        debug!("Precomputing {n}x{n} indexed kernel matrix");

        let mut matrix = operator.matrix(KernelMatrix::zeros(n), |rows, from, to| {
            for i in from..to {
                let row = &mut rows[(i - from) * n..(i - from + 1) * n];
                for j in i..n {
                    row[j] = kernel.compute(&samples[i], &samples[j]);
                }
            }
            Ok(())
        })?;
        matrix.mirror_upper();

        let values = matrix.into_vec().into_iter().map(|v| v as f32).collect();

        Ok(Self {
            index,
            keys,
            values,
        })
    }

    /// Cached value for a pair of keys
    ///
    /// Fails with [`SVMError::KeyNotFound`] if either key was not indexed.
    pub fn value_of(&self, a: &K, b: &K) -> Result<f64> {
        let i = self.require(a)?;
        let j = self.require(b)?;
        Ok(self.stored(i, j))
    }

    /// Dense index assigned to `key`
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Keys in index order
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Bytes held by the cached matrix
    pub fn memory_bytes(&self) -> usize {
        self.values.len() * std::mem::size_of::<f32>()
    }

    fn require(&self, key: &K) -> Result<usize> {
        self.index_of(key)
            .ok_or_else(|| SVMError::KeyNotFound(format!("{key:?}")))
    }

    fn require_all(&self, samples: &[Sample<K>]) -> Result<Vec<usize>> {
        samples.iter().map(|s| self.require(&s.value)).collect()
    }

    fn stored(&self, i: usize, j: usize) -> f64 {
        f64::from(self.values[i * self.keys.len() + j])
    }
}

impl<K> Kernel<K> for IndexedKernel<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    /// # Panics
    /// Panics with the [`SVMError::KeyNotFound`] message if either key was
    /// not indexed; use [`IndexedKernel::value_of`] to handle misses. When
    /// the panic happens inside a parallel fill (an indexed minor of a
    /// composite Gram matrix), the caller sees
    /// [`SVMError::ParallelFailure`] carrying that message.
    fn compute(&self, x: &K, y: &K) -> f64 {
        match self.value_of(x, y) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    /// Gram matrix read from the cache; any unindexed key fails with
    /// [`SVMError::KeyNotFound`]
    fn kernel_matrix(&self, samples: &[Sample<K>]) -> Result<KernelMatrix> {
        let indices = self.require_all(samples)?;
        let mut matrix = KernelMatrix::zeros(indices.len());
        for (a, &i) in indices.iter().enumerate() {
            for (b, &j) in indices.iter().enumerate() {
                matrix[(a, b)] = self.stored(i, j);
            }
        }
        Ok(matrix)
    }

    fn kernel_matrix_line(&self, x: &K, samples: &[Sample<K>]) -> Result<Vec<f64>> {
        let i = self.require(x)?;
        Ok(self
            .require_all(samples)?
            .into_iter()
            .map(|j| self.stored(i, j))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::RbfKernel;
    use approx::assert_relative_eq;

    fn entries() -> Vec<(&'static str, SparseVector)> {
        vec![
            ("a", SparseVector::dense(&[0.0, 0.0])),
            ("b", SparseVector::dense(&[1.0, 0.0])),
            ("c", SparseVector::dense(&[0.0, 2.0])),
            ("d", SparseVector::dense(&[-1.0, -1.0])),
        ]
    }

    #[test]
    fn test_lookup_matches_kernel() {
        let kernel = RbfKernel::new(0.5);
        let indexed = IndexedKernel::build(&kernel, entries()).expect("build should succeed");

        for (ka, xa) in entries() {
            for (kb, xb) in entries() {
                let cached = indexed.value_of(&ka, &kb).expect("keys are indexed");
                assert_relative_eq!(cached, kernel.compute(&xa, &xb), epsilon = 1e-6);
                assert_eq!(indexed.compute(&ka, &kb), cached);
            }
        }
    }

    #[test]
    fn test_index_follows_insertion_order() {
        let indexed = IndexedKernel::build(&RbfKernel::unit_gamma(), entries())
            .expect("build should succeed");

        assert_eq!(indexed.keys(), &["a", "b", "c", "d"]);
        assert_eq!(indexed.index_of(&"c"), Some(2));
        assert_eq!(indexed.len(), 4);
        assert_eq!(indexed.memory_bytes(), 16 * 4);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let indexed = IndexedKernel::build(&RbfKernel::unit_gamma(), entries())
            .expect("build should succeed");

        assert!(matches!(
            indexed.value_of(&"a", &"z"),
            Err(SVMError::KeyNotFound(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Key not found")]
    fn test_unknown_key_through_kernel_panics() {
        let indexed = IndexedKernel::build(&RbfKernel::unit_gamma(), entries())
            .expect("build should succeed");
        indexed.compute(&"z", &"a");
    }

    #[test]
    fn test_gram_and_line_over_keys() {
        let indexed = IndexedKernel::build(&RbfKernel::new(0.5), entries())
            .expect("build should succeed");
        let samples: Vec<_> = ["d", "a", "c"].into_iter().map(Sample::unlabeled).collect();

        let matrix = indexed.kernel_matrix(&samples).expect("keys are indexed");
        let line = indexed
            .kernel_matrix_line(&"b", &samples)
            .expect("keys are indexed");

        assert_eq!(matrix.dim(), 3);
        assert_eq!(matrix[(0, 2)], indexed.compute(&"d", &"c"));
        assert_eq!(matrix[(2, 0)], matrix[(0, 2)]);
        assert_eq!(
            line,
            vec![
                indexed.compute(&"b", &"d"),
                indexed.compute(&"b", &"a"),
                indexed.compute(&"b", &"c"),
            ]
        );
    }

    #[test]
    fn test_gram_and_line_report_missing_keys() {
        let indexed = IndexedKernel::build(&RbfKernel::unit_gamma(), entries())
            .expect("build should succeed");
        let samples: Vec<_> = ["a", "z"].into_iter().map(Sample::unlabeled).collect();

        assert!(matches!(
            indexed.kernel_matrix(&samples),
            Err(SVMError::KeyNotFound(_))
        ));
        assert!(matches!(
            indexed.kernel_matrix_line(&"a", &samples),
            Err(SVMError::KeyNotFound(_))
        ));
        assert!(matches!(
            indexed.kernel_matrix_line(&"z", &samples[..1]),
            Err(SVMError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let mut duplicated = entries();
        duplicated.push(("a", SparseVector::dense(&[5.0, 5.0])));

        assert!(matches!(
            IndexedKernel::build(&RbfKernel::unit_gamma(), duplicated),
            Err(SVMError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_empty_index() {
        let indexed = IndexedKernel::<u32>::build(&RbfKernel::unit_gamma(), Vec::new())
            .expect("build should succeed");
        assert!(indexed.is_empty());
        assert_eq!(indexed.memory_bytes(), 0);
    }
}
