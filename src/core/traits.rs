//! Core traits shared across the crate

use crate::core::{Prediction, Result, Sample};

/// Binary classifier consumed as an opaque trainable scorer
///
/// The transductive trainer only ever talks to its base classifier through
/// this contract: set the regularization bound, train on a batch of ±1
/// labeled samples, and score inputs.
pub trait TrainableScorer<T>: Send + Sync {
    /// Train on the given samples, replacing any previous model
    ///
    /// Fails on degenerate input (empty batch, labels other than ±1,
    /// a single class).
    fn train(&mut self, samples: &[Sample<T>]) -> Result<()>;

    /// Decision value of a single input
    fn score(&self, x: &T) -> Result<f64>;

    /// Decision values for a batch of samples, in order
    fn score_batch(&self, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        samples.iter().map(|s| self.score(&s.value)).collect()
    }

    /// Predicted label and decision value of a single input
    fn predict(&self, x: &T) -> Result<Prediction> {
        self.score(x).map(Prediction::from_decision_value)
    }

    /// Set the regularization parameter used by the next `train`
    fn set_c(&mut self, c: f64);

    /// Current regularization parameter
    fn c(&self) -> f64;
}
