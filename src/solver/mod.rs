//! Dual solvers for the base SVM classifier

pub mod smo;

pub use self::smo::*;
