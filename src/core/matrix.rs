//! Square row-major buffer for Gram matrices

use std::ops::{Index, IndexMut};

/// Square matrix of kernel values, stored row-major
///
/// Row and column indices are positions in the sample sequence the matrix
/// was built from. Symmetry is a property of the kernel, not of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl KernelMatrix {
    /// All-zero `n × n` matrix
    pub fn zeros(n: usize) -> Self {
        Self::filled(n, 0.0)
    }

    /// `n × n` matrix with every entry set to `value`
    pub fn filled(n: usize, value: f64) -> Self {
        Self {
            dim: n,
            data: vec![value; n * n],
        }
    }

    /// Number of rows (and columns)
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.dim + j] = value;
    }

    /// Row `i` as a slice
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Copy the upper triangle (`j > i`) onto the lower one
    pub fn mirror_upper(&mut self) {
        let n = self.dim;
        for i in 0..n {
            for j in (i + 1)..n {
                self.data[j * n + i] = self.data[i * n + j];
            }
        }
    }

    /// Whether `|M[i][j] - M[j][i]| <= tolerance` for every pair
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let n = self.dim;
        (0..n).all(|i| ((i + 1)..n).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tolerance))
    }
}

impl Index<(usize, usize)> for KernelMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.dim + j]
    }
}

impl IndexMut<(usize, usize)> for KernelMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.dim + j]
    }
}
