//! Kernel functions, composites and precomputed kernels

pub mod composite;
pub mod indexed;
pub mod linear;
pub mod matrix;
pub mod rbf;
pub mod traits;

pub use self::composite::*;
pub use self::indexed::*;
pub use self::linear::*;
pub use self::matrix::*;
pub use self::rbf::*;
pub use self::traits::*;
