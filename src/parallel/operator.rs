//! Row-partitioned parallel fills of matrices and vectors
//!
//! A buffer of `N` rows is split into contiguous chunks; each chunk is
//! handed to one task as a disjoint mutable slice, so the result does not
//! depend on scheduling. Any failing chunk fails the whole call.

use crate::core::{KernelMatrix, Result};
use crate::parallel::pool::{join_all, PoolConfig, ThreadPoolResource};
use log::trace;

/// How rows are grouped into tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chunking {
    /// One row per task
    #[default]
    PerRow,
    /// A fixed number of rows per task
    Rows(usize),
    /// Twice as many chunks as worker threads
    PerCpu,
}

impl Chunking {
    /// Rows handed to each task for a buffer of `n` rows on `threads` workers
    pub fn rows_per_chunk(&self, n: usize, threads: usize) -> usize {
        match *self {
            Chunking::PerRow => 1,
            Chunking::Rows(rows) => rows.max(1),
            Chunking::PerCpu => n.div_ceil(2 * threads.max(1)).max(1),
        }
    }
}

/// Settings for the parallel operator
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParallelConfig {
    pub chunking: Chunking,
    pub pool: PoolConfig,
}

impl ParallelConfig {
    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.pool = self.pool.with_threads(threads);
        self
    }
}

/// Executes per-range fill callbacks over a freshly acquired worker pool
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelOperator {
    config: ParallelConfig,
}

impl ParallelOperator {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Fill a square matrix in parallel
    ///
    /// `compute_range(rows, from, to)` receives the row-major slice holding
    /// rows `from..to`; entry `(i, j)` lives at `rows[(i - from) * n + j]`.
    /// Existing buffer contents are visible to the callback, so fills can
    /// accumulate into a previously computed matrix.
    pub fn matrix<F>(&self, mut buffer: KernelMatrix, compute_range: F) -> Result<KernelMatrix>
    where
        F: Fn(&mut [f64], usize, usize) -> Result<()> + Sync,
    {
        let n = buffer.dim();
        self.run(buffer.as_mut_slice(), n, n, &compute_range)?;
        Ok(buffer)
    }

    /// Fill a vector in parallel; `compute_range(values, from, to)` owns `values[from..to]`
    pub fn vector<F>(&self, mut buffer: Vec<f64>, compute_range: F) -> Result<Vec<f64>>
    where
        F: Fn(&mut [f64], usize, usize) -> Result<()> + Sync,
    {
        let n = buffer.len();
        self.run(&mut buffer, n, 1, &compute_range)?;
        Ok(buffer)
    }

    fn run<F>(&self, data: &mut [f64], rows: usize, width: usize, compute_range: &F) -> Result<()>
    where
        F: Fn(&mut [f64], usize, usize) -> Result<()> + Sync,
    {
        if rows == 0 {
            return Ok(());
        }

        let pool = ThreadPoolResource::acquire_with(self.config.pool)?;
        let rows_per_chunk = self.config.chunking.rows_per_chunk(rows, pool.threads());
        let chunks: Vec<(usize, &mut [f64])> = data
            .chunks_mut(rows_per_chunk * width)
            .enumerate()
            .map(|(chunk, slice)| (chunk * rows_per_chunk, slice))
            .collect();

        trace!(
            "Filling {rows} rows in {} chunks on {} threads",
            chunks.len(),
            pool.threads()
        );

        let outcome = pool.scope(move |scope| {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|(from, slice)| {
                    let to = from + slice.len() / width;
                    scope.submit(move || compute_range(slice, from, to))
                })
                .collect();
            join_all(handles)
        });

        let shutdown = pool.shutdown();
        outcome.and_then(|result| result)?;
        shutdown
    }
}
