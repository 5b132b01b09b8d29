//! Kernel machine toolkit with transductive SVM training
//!
//! Kernels (including weighted sum/product composites and precomputed
//! indexed kernels) compute Gram matrices on per-call worker pools. A
//! soft-margin SVM trained by SMO serves as the base classifier of an
//! S3VMLight-style transductive trainer.

pub mod cache;
pub mod classifier;
pub mod core;
pub mod data;
pub mod kernel;
pub mod parallel;
pub mod solver;
pub mod transductive;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::classifier::{SvmClassifier, TrainedSVM};
pub use crate::core::error::{Result, SVMError};
pub use crate::core::matrix::KernelMatrix;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::kernel::{
    IndexedKernel, Kernel, LinearKernel, MatrixKernel, ParametricKernel, RbfKernel,
    WeightedProductKernel, WeightedSumKernel,
};
pub use crate::parallel::{
    Chunking, ParallelConfig, ParallelOperator, PoolConfig, ThreadPoolResource,
};
pub use crate::solver::SMOSolver;
pub use crate::transductive::{
    AnnealSchedule, TrainingSummary, TransductiveConfig, TransductiveTrainer,
};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
