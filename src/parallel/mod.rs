//! Parallel computation substrate
//!
//! [`ThreadPoolResource`] is a worker pool scoped to one computation;
//! [`ParallelOperator`] partitions a matrix or vector fill across such a pool.

pub mod operator;
pub mod pool;

pub use self::operator::*;
pub use self::pool::*;
