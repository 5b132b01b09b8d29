//! Kernel SVM classifier used as the base learner of the transductive trainer
//!
//! [`SvmClassifier`] trains with the SMO solver and keeps the resulting
//! [`TrainedSVM`]. Batch scoring is spread over a parallel vector fill.

use crate::core::{
    OptimizationResult, OptimizerConfig, Prediction, Result, SVMError, Sample, TrainableScorer,
};
use crate::kernel::Kernel;
use crate::parallel::ParallelOperator;
use crate::solver::SMOSolver;
use log::debug;
use std::sync::Arc;

/// Soft-margin SVM over inputs of type `T`
pub struct SvmClassifier<T> {
    kernel: Arc<dyn Kernel<T>>,
    config: OptimizerConfig,
    operator: ParallelOperator,
    model: Option<TrainedSVM<T>>,
}

impl<T> SvmClassifier<T> {
    /// Classifier with the default optimizer settings (`C = 1`)
    pub fn new(kernel: Arc<dyn Kernel<T>>) -> Self {
        Self::with_config(kernel, OptimizerConfig::default())
    }

    pub fn with_config(kernel: Arc<dyn Kernel<T>>, config: OptimizerConfig) -> Self {
        Self {
            kernel,
            config,
            operator: ParallelOperator::default(),
            model: None,
        }
    }

    /// Use `operator` for batch scoring
    pub fn with_operator(mut self, operator: ParallelOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel<T>> {
        &self.kernel
    }

    /// The model from the last successful `train`, if any
    pub fn model(&self) -> Option<&TrainedSVM<T>> {
        self.model.as_ref()
    }

    fn trained(&self) -> Result<&TrainedSVM<T>> {
        self.model.as_ref().ok_or(SVMError::ModelNotTrained)
    }
}

impl<T> TrainableScorer<T> for SvmClassifier<T>
where
    T: Clone + Send + Sync,
{
    fn train(&mut self, samples: &[Sample<T>]) -> Result<()> {
        let solver = SMOSolver::new(Arc::clone(&self.kernel), self.config.clone());
        let result = solver.solve(samples)?;
        debug!(
            "Trained SVM on {} samples with C = {}: {} support vectors",
            samples.len(),
            self.config.c,
            result.support_vectors.len()
        );
        self.model = Some(TrainedSVM::new(Arc::clone(&self.kernel), samples, result));
        Ok(())
    }

    fn score(&self, x: &T) -> Result<f64> {
        Ok(self.trained()?.decision_function(x))
    }

    fn score_batch(&self, samples: &[Sample<T>]) -> Result<Vec<f64>> {
        let model = self.trained()?;
        self.operator
            .vector(vec![0.0; samples.len()], |values, from, _| {
                for (offset, value) in values.iter_mut().enumerate() {
                    *value = model.decision_function(&samples[from + offset].value);
                }
                Ok(())
            })
    }

    fn set_c(&mut self, c: f64) {
        self.config.c = c;
    }

    fn c(&self) -> f64 {
        self.config.c
    }
}

/// Support vectors and coefficients of a solved SVM
pub struct TrainedSVM<T> {
    kernel: Arc<dyn Kernel<T>>,
    support_vectors: Vec<Sample<T>>,
    alpha: Vec<f64>,
    bias: f64,
    support_indices: Vec<usize>,
}

impl<T: Clone> TrainedSVM<T> {
    pub(crate) fn new(
        kernel: Arc<dyn Kernel<T>>,
        training_samples: &[Sample<T>],
        result: OptimizationResult,
    ) -> Self {
        let support_vectors = result
            .support_vectors
            .iter()
            .map(|&i| training_samples[i].clone())
            .collect();
        let alpha = result
            .support_vectors
            .iter()
            .map(|&i| result.alpha[i])
            .collect();

        Self {
            kernel,
            support_vectors,
            alpha,
            bias: result.b,
            support_indices: result.support_vectors,
        }
    }
}

impl<T> TrainedSVM<T> {
    /// `Σ alpha_i y_i K(sv_i, x) + b`
    pub fn decision_function(&self, x: &T) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.alpha)
            .map(|(sv, a)| a * f64::from(sv.label) * self.kernel.compute(&sv.value, x))
            .sum::<f64>()
            + self.bias
    }

    pub fn predict(&self, x: &T) -> Prediction {
        Prediction::from_decision_value(self.decision_function(x))
    }

    pub fn support_vectors(&self) -> &[Sample<T>] {
        &self.support_vectors
    }

    /// Multipliers of the support vectors, aligned with [`support_vectors`](Self::support_vectors)
    pub fn alpha_values(&self) -> &[f64] {
        &self.alpha
    }

    /// Positions of the support vectors in the training batch
    pub fn support_vector_indices(&self) -> &[usize] {
        &self.support_indices
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SparseVector, NEGATIVE, POSITIVE};
    use crate::kernel::{LinearKernel, RbfKernel};

    fn line_samples() -> Vec<Sample<SparseVector>> {
        [2.0, -2.0, 1.5, -1.5, 3.0, -2.5]
            .into_iter()
            .map(|x: f64| {
                let label = if x > 0.0 { POSITIVE } else { NEGATIVE };
                Sample::new(SparseVector::dense(&[x]), label)
            })
            .collect()
    }

    #[test]
    fn test_untrained_classifier_cannot_score() {
        let classifier = SvmClassifier::<SparseVector>::new(Arc::new(LinearKernel::new()));
        assert!(matches!(
            classifier.score(&SparseVector::dense(&[1.0])),
            Err(SVMError::ModelNotTrained)
        ));
        assert!(matches!(
            classifier.score_batch(&line_samples()),
            Err(SVMError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_training_separates_the_line() {
        let mut classifier = SvmClassifier::<SparseVector>::new(Arc::new(LinearKernel::new()));
        let samples = line_samples();
        classifier.train(&samples).expect("training should succeed");

        for sample in &samples {
            let prediction = classifier.predict(&sample.value).expect("model is trained");
            assert_eq!(prediction.label, sample.label);
        }

        let model = classifier.model().expect("model is trained");
        assert!(model.n_support_vectors() > 0);
        assert_eq!(model.alpha_values().len(), model.support_vectors().len());
        assert!(model.alpha_values().iter().all(|&a| a > 0.0));
        assert!(model
            .support_vector_indices()
            .iter()
            .all(|&i| i < samples.len()));
    }

    #[test]
    fn test_batch_scores_match_single_scores() {
        let mut classifier = SvmClassifier::<SparseVector>::new(Arc::new(RbfKernel::new(0.5)));
        let samples = line_samples();
        classifier.train(&samples).expect("training should succeed");

        let probes: Vec<_> = (-10..=10)
            .map(|i| Sample::unlabeled(SparseVector::dense(&[i as f64 * 0.4])))
            .collect();
        let batch = classifier.score_batch(&probes).expect("model is trained");

        for (probe, score) in probes.iter().zip(batch) {
            let single = classifier.score(&probe.value).expect("model is trained");
            assert_eq!(score, single);
        }
    }

    #[test]
    fn test_set_c_applies_to_next_training() {
        let mut classifier = SvmClassifier::<SparseVector>::new(Arc::new(LinearKernel::new()));
        classifier.set_c(1e-3);
        assert_eq!(classifier.c(), 1e-3);

        classifier.train(&line_samples()).expect("training should succeed");
        let model = classifier.model().expect("model is trained");
        assert!(model.alpha_values().iter().all(|&a| a <= 1e-3));
    }

    #[test]
    fn test_single_class_batch_is_rejected() {
        let mut classifier = SvmClassifier::<SparseVector>::new(Arc::new(LinearKernel::new()));
        let samples: Vec<_> = line_samples()
            .into_iter()
            .filter(|s| s.label == POSITIVE)
            .collect();

        assert!(matches!(
            classifier.train(&samples),
            Err(SVMError::InvalidDataset(_))
        ));
        assert!(classifier.model().is_none());
    }
}
