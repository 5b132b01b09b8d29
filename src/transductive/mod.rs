//! Transductive SVM training with annealed pseudo-labels
//!
//! Unlabeled samples receive pseudo-labels from a classifier trained on the
//! labeled set, keeping the labeled class proportion. The regularization
//! bound is then annealed towards `C`; at each step pairs of pseudo-labels
//! that the current classifier disagrees with are swapped and the base
//! classifier is retrained.

pub mod schedule;
pub mod search;

pub use self::schedule::AnnealSchedule;
pub use self::search::{find_swap, seed_labels, violation_scores};

use crate::classifier::SvmClassifier;
use crate::core::{
    Label, Prediction, Result, SVMError, Sample, TrainableScorer, NEGATIVE, POSITIVE,
};
use crate::kernel::Kernel;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Hyperparameters of the transductive trainer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransductiveConfig {
    /// Final regularization bound
    pub c: f64,
    /// Starting value of the annealed bounds
    pub c_init: f64,
    /// Cap on accepted swaps per annealing round; `None` searches until no pair qualifies
    pub max_swaps_per_round: Option<usize>,
}

impl Default for TransductiveConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            c_init: 1e-5,
            max_swaps_per_round: None,
        }
    }
}

/// What a call to [`TransductiveTrainer::train`] did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Positive pseudo-labels kept throughout training
    pub numplus: usize,
    /// Annealing rounds run
    pub outer_iterations: usize,
    /// Accepted pseudo-label swaps
    pub swaps: usize,
    /// Calls to the base classifier's `train`
    pub retrains: usize,
    pub final_c_minus: f64,
    pub final_c_plus: f64,
}

/// Transductive trainer over a base classifier `S`
///
/// ```no_run
/// use rtsvm::{Kernel, RbfKernel, Sample, SparseVector, TransductiveTrainer};
/// use std::sync::Arc;
///
/// let labeled = vec![
///     Sample::new(SparseVector::dense(&[-2.0, -2.0]), -1),
///     Sample::new(SparseVector::dense(&[2.0, 2.0]), 1),
/// ];
/// let unlabeled = vec![
///     Sample::unlabeled(SparseVector::dense(&[-1.5, -2.5])),
///     Sample::unlabeled(SparseVector::dense(&[2.5, 1.5])),
/// ];
///
/// let kernel: Arc<dyn Kernel<SparseVector>> = Arc::new(RbfKernel::unit_gamma());
/// let mut trainer = TransductiveTrainer::new(kernel).with_c(10.0);
/// trainer.train(&labeled, &unlabeled)?;
/// let prediction = trainer.predict(&SparseVector::dense(&[1.8, 2.1]))?;
/// println!("label {} with margin {:.3}", prediction.label, prediction.decision_value);
/// # Ok::<(), rtsvm::SVMError>(())
/// ```
pub struct TransductiveTrainer<T, S = SvmClassifier<T>> {
    classifier: S,
    config: TransductiveConfig,
    numplus: Option<usize>,
    pseudo_labels: Vec<Label>,
    summary: Option<TrainingSummary>,
    _input: PhantomData<fn(&T)>,
}

impl<T> TransductiveTrainer<T>
where
    T: Clone + Send + Sync,
{
    /// Trainer over an [`SvmClassifier`] with `kernel`
    pub fn new(kernel: Arc<dyn Kernel<T>>) -> Self {
        Self::with_classifier(SvmClassifier::new(kernel))
    }
}

impl<T, S> TransductiveTrainer<T, S>
where
    T: Clone,
    S: TrainableScorer<T>,
{
    /// Trainer over an arbitrary base classifier
    pub fn with_classifier(classifier: S) -> Self {
        Self {
            classifier,
            config: TransductiveConfig::default(),
            numplus: None,
            pseudo_labels: Vec::new(),
            summary: None,
            _input: PhantomData,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Fix the number of positive pseudo-labels instead of estimating it
    pub fn with_numplus(mut self, numplus: usize) -> Self {
        self.numplus = Some(numplus);
        self
    }

    pub fn with_config(mut self, config: TransductiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TransductiveConfig {
        &self.config
    }

    pub fn c(&self) -> f64 {
        self.config.c
    }

    pub fn set_c(&mut self, c: f64) {
        self.config.c = c;
    }

    /// The override if one is set, otherwise the value used by the last training
    pub fn numplus(&self) -> Option<usize> {
        self.numplus
            .or_else(|| self.summary.as_ref().map(|s| s.numplus))
    }

    /// Set or clear the positive pseudo-label count override
    pub fn set_numplus(&mut self, numplus: Option<usize>) {
        self.numplus = numplus;
    }

    /// Final pseudo-labels of the unlabeled samples, in input order
    pub fn pseudo_labels(&self) -> &[Label] {
        &self.pseudo_labels
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    pub fn classifier(&self) -> &S {
        &self.classifier
    }

    /// Train on `labeled` (labels ±1) and `unlabeled` (labels ignored)
    ///
    /// Base classifier failures are returned unchanged and leave the
    /// trainer untrained.
    pub fn train(
        &mut self,
        labeled: &[Sample<T>],
        unlabeled: &[Sample<T>],
    ) -> Result<&TrainingSummary> {
        self.summary = None;
        self.pseudo_labels.clear();
        self.validate(labeled)?;

        let c = self.config.c;
        let m = unlabeled.len();
        self.classifier.set_c(c);

        if m == 0 {
            info!("No unlabeled samples, training supervised on {} samples", labeled.len());
            self.classifier.train(labeled)?;
            return Ok(&*self.summary.insert(TrainingSummary {
                numplus: 0,
                outer_iterations: 0,
                swaps: 0,
                retrains: 1,
                final_c_minus: c,
                final_c_plus: c,
            }));
        }

        let numplus = self.resolve_numplus(labeled, m)?;
        let mut schedule = AnnealSchedule::new(c, self.config.c_init, numplus, m)?;
        info!(
            "Transductive training: {} labeled, {m} unlabeled, numplus = {numplus}, C = {c}",
            labeled.len()
        );

        self.classifier.train(labeled)?;
        let mut retrains = 1;

        let n = labeled.len();
        let mut combined: Vec<Sample<T>> = labeled.to_vec();
        combined.extend(unlabeled.iter().map(|s| Sample::unlabeled(s.value.clone())));

        let mut labels = seed_labels(&self.classifier.score_batch(&combined[n..])?, numplus);
        apply_labels(&mut combined[n..], &labels);

        let mut outer_iterations = 0;
        let mut swaps = 0;

        for round_c in schedule.by_ref() {
            outer_iterations += 1;
            self.classifier.set_c(round_c);
            self.classifier.train(&combined)?;
            retrains += 1;

            let mut round_swaps = 0;
            loop {
                if self
                    .config
                    .max_swaps_per_round
                    .is_some_and(|cap| round_swaps >= cap)
                {
                    warn!("Swap limit of {round_swaps} reached at C = {round_c:.3e}");
                    break;
                }

                let scores = self.classifier.score_batch(&combined[n..])?;
                let violations = violation_scores(&scores, &labels);
                let Some((i, j)) = find_swap(&violations, &labels) else {
                    break;
                };

                debug!(
                    "Swapping pseudo-labels of unlabeled samples {i} and {j} (violations {:.4}, {:.4})",
                    violations[i], violations[j]
                );
                labels.swap(i, j);
                combined[n + i].label = labels[i];
                combined[n + j].label = labels[j];
                round_swaps += 1;

                self.classifier.train(&combined)?;
                retrains += 1;
            }

            swaps += round_swaps;
            info!("Annealing round {outer_iterations}: C = {round_c:.3e}, {round_swaps} swaps");
        }

        if outer_iterations == 0 {
            debug!(
                "c_init {} is not below C, training once on the seeded labels",
                self.config.c_init
            );
            self.classifier.set_c(c);
            self.classifier.train(&combined)?;
            retrains += 1;
        }

        info!(
            "Transductive training finished: {} rounds, {} swaps, {} retrains",
            outer_iterations, swaps, retrains
        );

        self.pseudo_labels = labels;
        Ok(&*self.summary.insert(TrainingSummary {
            numplus,
            outer_iterations,
            swaps,
            retrains,
            final_c_minus: schedule.c_minus(),
            final_c_plus: schedule.c_plus(),
        }))
    }

    /// Decision value of the final classifier
    pub fn value_of(&self, x: &T) -> Result<f64> {
        if self.summary.is_none() {
            return Err(SVMError::ModelNotTrained);
        }
        self.classifier.score(x)
    }

    pub fn predict(&self, x: &T) -> Result<Prediction> {
        self.value_of(x).map(Prediction::from_decision_value)
    }

    fn validate(&self, labeled: &[Sample<T>]) -> Result<()> {
        let c = self.config.c;
        if !c.is_finite() || c <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive and finite, got {c}"
            )));
        }
        if labeled.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        if let Some(bad) = labeled
            .iter()
            .find(|s| s.label != POSITIVE && s.label != NEGATIVE)
        {
            return Err(SVMError::InvalidLabel(bad.label));
        }
        Ok(())
    }

    fn resolve_numplus(&self, labeled: &[Sample<T>], m: usize) -> Result<usize> {
        match self.numplus {
            Some(numplus) if numplus > m => Err(SVMError::InvalidParameter(format!(
                "numplus {numplus} exceeds the {m} unlabeled samples"
            ))),
            Some(numplus) => Ok(numplus),
            None => {
                let positives = labeled.iter().filter(|s| s.label == POSITIVE).count();
                let fraction = positives as f64 / labeled.len() as f64;
                Ok(((fraction * m as f64).round() as usize).min(m))
            }
        }
    }
}

fn apply_labels<T>(samples: &mut [Sample<T>], labels: &[Label]) {
    for (sample, &label) in samples.iter_mut().zip(labels) {
        sample.label = label;
    }
}
