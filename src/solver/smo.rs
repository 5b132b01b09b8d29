//! Sequential Minimal Optimization (SMO) solver for the C-SVC dual
//!
//! Each iteration picks the maximal violating pair of multipliers, solves
//! the two-variable subproblem analytically and updates the gradient of the
//! dual objective. Kernel entries are served from an LRU [`KernelCache`].

use crate::cache::KernelCache;
use crate::core::{
    OptimizationResult, OptimizerConfig, Result, SVMError, Sample, NEGATIVE, POSITIVE,
};
use crate::kernel::Kernel;
use log::{debug, warn};
use std::sync::Arc;

/// Curvature used when the pair's second derivative is not positive
const TAU: f64 = 1e-12;

/// SMO solver over samples of type `T`
pub struct SMOSolver<T> {
    kernel: Arc<dyn Kernel<T>>,
    config: OptimizerConfig,
}

impl<T> SMOSolver<T> {
    pub fn new(kernel: Arc<dyn Kernel<T>>, config: OptimizerConfig) -> Self {
        Self { kernel, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Solve the dual problem for `samples`, whose labels must be ±1
    ///
    /// The returned bias `b` belongs to the decision function
    /// `f(x) = Σ alpha_i y_i K(x_i, x) + b`.
    pub fn solve(&self, samples: &[Sample<T>]) -> Result<OptimizationResult> {
        let mut cache = KernelCache::with_memory_limit(self.config.cache_size);
        self.solve_with_cache(samples, &mut cache)
    }

    /// Solve with a caller-owned cache indexed by positions in `samples`
    pub fn solve_with_cache(
        &self,
        samples: &[Sample<T>],
        cache: &mut KernelCache,
    ) -> Result<OptimizationResult> {
        self.validate(samples)?;

        let n = samples.len();
        let c = self.config.c;
        let y: Vec<f64> = samples.iter().map(|s| f64::from(s.label)).collect();
        let diagonal: Vec<f64> = samples
            .iter()
            .map(|s| self.kernel.self_value(&s.value))
            .collect();

        let mut alpha = vec![0.0; n];
        // Gradient of (1/2) a'Qa - e'a at a = 0
        let mut gradient = vec![-1.0; n];

        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            let Some((i, j)) = select_working_pair(&y, &alpha, &gradient, c, self.config.epsilon)
            else {
                break;
            };
            iterations += 1;

            let k_ij = self.entry(cache, samples, i, j);
            let (old_i, old_j) = (alpha[i], alpha[j]);
            let (new_i, new_j) = solve_pair(
                (y[i], y[j]),
                (old_i, old_j),
                (gradient[i], gradient[j]),
                diagonal[i] + diagonal[j] - 2.0 * k_ij,
                c,
            );
            alpha[i] = new_i;
            alpha[j] = new_j;

            let delta_i = (new_i - old_i) * y[i];
            let delta_j = (new_j - old_j) * y[j];
            for k in 0..n {
                let k_ik = self.entry(cache, samples, i, k);
                let k_jk = self.entry(cache, samples, j, k);
                gradient[k] += y[k] * (k_ik * delta_i + k_jk * delta_j);
            }
        }

        if iterations >= self.config.max_iterations {
            warn!(
                "SMO stopped after reaching the iteration limit of {}",
                self.config.max_iterations
            );
        }

        let rho = compute_rho(&y, &alpha, &gradient, c);
        let objective_value = alpha
            .iter()
            .zip(&gradient)
            .map(|(a, g)| a * (g - 1.0))
            .sum::<f64>()
            / 2.0;
        let support_vectors: Vec<usize> = (0..n).filter(|&i| alpha[i] > 0.0).collect();

        debug!(
            "SMO converged in {iterations} iterations: {} support vectors, objective {objective_value:.6}, cache hit rate {:.2}",
            support_vectors.len(),
            cache.hit_rate()
        );

        Ok(OptimizationResult {
            alpha,
            b: -rho,
            support_vectors,
            iterations,
            objective_value,
        })
    }

    fn validate(&self, samples: &[Sample<T>]) -> Result<()> {
        let c = self.config.c;
        if !c.is_finite() || c <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive and finite, got {c}"
            )));
        }
        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        if let Some(bad) = samples
            .iter()
            .find(|s| s.label != POSITIVE && s.label != NEGATIVE)
        {
            return Err(SVMError::InvalidLabel(bad.label));
        }
        let first = samples[0].label;
        if samples.iter().all(|s| s.label == first) {
            return Err(SVMError::InvalidDataset(format!(
                "training batch only contains class {first}"
            )));
        }
        Ok(())
    }

    fn entry(&self, cache: &mut KernelCache, samples: &[Sample<T>], i: usize, j: usize) -> f64 {
        cache.get_or_compute(i, j, || {
            self.kernel.compute(&samples[i].value, &samples[j].value)
        })
    }
}

/// Maximal violating pair, or `None` once the KKT gap is below `epsilon`
fn select_working_pair(
    y: &[f64],
    alpha: &[f64],
    gradient: &[f64],
    c: f64,
    epsilon: f64,
) -> Option<(usize, usize)> {
    let mut up = None;
    let mut up_value = f64::NEG_INFINITY;
    let mut low = None;
    let mut low_value = f64::INFINITY;

    for t in 0..y.len() {
        let value = -y[t] * gradient[t];
        let can_increase = if y[t] > 0.0 { alpha[t] < c } else { alpha[t] > 0.0 };
        let can_decrease = if y[t] > 0.0 { alpha[t] > 0.0 } else { alpha[t] < c };

        if can_increase && value > up_value {
            up_value = value;
            up = Some(t);
        }
        if can_decrease && value < low_value {
            low_value = value;
            low = Some(t);
        }
    }

    match (up, low) {
        (Some(i), Some(j)) if up_value - low_value >= epsilon => Some((i, j)),
        _ => None,
    }
}

/// Analytic solution of the two-variable subproblem, clipped to `[0, c]`
fn solve_pair(
    (y_i, y_j): (f64, f64),
    (mut a_i, mut a_j): (f64, f64),
    (g_i, g_j): (f64, f64),
    curvature: f64,
    c: f64,
) -> (f64, f64) {
    let quad = if curvature > 0.0 { curvature } else { TAU };

    if y_i != y_j {
        let delta = (-g_i - g_j) / quad;
        let diff = a_i - a_j;
        a_i += delta;
        a_j += delta;
        if diff > 0.0 {
            if a_j < 0.0 {
                a_j = 0.0;
                a_i = diff;
            }
        } else if a_i < 0.0 {
            a_i = 0.0;
            a_j = -diff;
        }
        if diff > 0.0 {
            if a_i > c {
                a_i = c;
                a_j = c - diff;
            }
        } else if a_j > c {
            a_j = c;
            a_i = c + diff;
        }
    } else {
        let delta = (g_i - g_j) / quad;
        let sum = a_i + a_j;
        a_i -= delta;
        a_j += delta;
        if sum > c {
            if a_i > c {
                a_i = c;
                a_j = sum - c;
            }
        } else if a_j < 0.0 {
            a_j = 0.0;
            a_i = sum;
        }
        if sum > c {
            if a_j > c {
                a_j = c;
                a_i = sum - c;
            }
        } else if a_i < 0.0 {
            a_i = 0.0;
            a_j = sum;
        }
    }

    (a_i, a_j)
}

/// Offset `rho` of the decision function `Σ alpha_i y_i K(x_i, x) - rho`
fn compute_rho(y: &[f64], alpha: &[f64], gradient: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;

    for t in 0..y.len() {
        let yg = y[t] * gradient[t];
        if alpha[t] >= c {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_sum += yg;
            free_count += 1;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::{LinearKernel, RbfKernel};
    use approx::assert_abs_diff_eq;

    fn point(x: f64, y: f64, label: i32) -> Sample<SparseVector> {
        Sample::new(SparseVector::dense(&[x, y]), label)
    }

    fn decision(
        kernel: &dyn Kernel<SparseVector>,
        samples: &[Sample<SparseVector>],
        result: &OptimizationResult,
        x: &SparseVector,
    ) -> f64 {
        samples
            .iter()
            .zip(&result.alpha)
            .map(|(s, a)| a * f64::from(s.label) * kernel.compute(&s.value, x))
            .sum::<f64>()
            + result.b
    }

    #[test]
    fn test_two_points_hard_margin() {
        let samples = vec![point(1.0, 0.0, 1), point(-1.0, 0.0, -1)];
        let config = OptimizerConfig {
            c: 10.0,
            ..Default::default()
        };
        let solver = SMOSolver::<SparseVector>::new(Arc::new(LinearKernel::new()), config);
        let result = solver.solve(&samples).expect("solve should succeed");

        // w = (1, 0), b = 0, alpha = 0.5 each
        assert_abs_diff_eq!(result.alpha[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result.alpha[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result.b, 0.0, epsilon = 1e-6);
        assert_eq!(result.support_vectors, vec![0, 1]);
    }

    #[test]
    fn test_separable_data_is_classified() {
        let samples = vec![
            point(2.0, 2.0, 1),
            point(3.0, 1.5, 1),
            point(2.5, 3.0, 1),
            point(-2.0, -1.0, -1),
            point(-3.0, -2.5, -1),
            point(-1.5, -3.0, -1),
        ];
        let kernel: Arc<dyn Kernel<SparseVector>> = Arc::new(RbfKernel::new(0.2));
        let solver = SMOSolver::new(Arc::clone(&kernel), OptimizerConfig::default());
        let result = solver.solve(&samples).expect("solve should succeed");

        for s in &samples {
            let f = decision(kernel.as_ref(), &samples, &result, &s.value);
            assert_eq!(f.signum() as i32, s.label);
        }
        assert!(result.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));

        let balance: f64 = samples
            .iter()
            .zip(&result.alpha)
            .map(|(s, a)| a * f64::from(s.label))
            .sum();
        assert_abs_diff_eq!(balance, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_alphas_respect_box_constraint() {
        // overlapping classes force bounded multipliers
        let samples = vec![
            point(0.0, 0.0, 1),
            point(0.1, 0.0, -1),
            point(0.0, 0.1, 1),
            point(0.1, 0.1, -1),
            point(1.0, 1.0, 1),
            point(-1.0, -1.0, -1),
        ];
        let config = OptimizerConfig {
            c: 0.5,
            ..Default::default()
        };
        let solver = SMOSolver::<SparseVector>::new(Arc::new(LinearKernel::new()), config);
        let result = solver.solve(&samples).expect("solve should succeed");

        assert!(result.alpha.iter().all(|&a| (0.0..=0.5).contains(&a)));
        assert!(result.alpha.iter().any(|&a| a > 0.45));
    }

    #[test]
    fn test_rejects_invalid_batches() {
        let solver = SMOSolver::<SparseVector>::new(
            Arc::new(LinearKernel::new()),
            OptimizerConfig::default(),
        );

        assert!(matches!(solver.solve(&[]), Err(SVMError::EmptyDataset)));
        assert!(matches!(
            solver.solve(&[point(0.0, 0.0, 1), point(1.0, 0.0, 0)]),
            Err(SVMError::InvalidLabel(0))
        ));
        assert!(matches!(
            solver.solve(&[point(0.0, 0.0, 1), point(1.0, 0.0, 1)]),
            Err(SVMError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite_c() {
        let config = OptimizerConfig {
            c: f64::INFINITY,
            ..Default::default()
        };
        let solver = SMOSolver::<SparseVector>::new(Arc::new(LinearKernel::new()), config);
        assert!(matches!(
            solver.solve(&[point(1.0, 0.0, 1), point(-1.0, 0.0, -1)]),
            Err(SVMError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_solve_pair_clips_to_box() {
        let (a_i, a_j) = solve_pair((1.0, -1.0), (0.0, 0.0), (-1.0, -1.0), 0.1, 1.0);
        assert_eq!((a_i, a_j), (1.0, 1.0));

        let (a_i, a_j) = solve_pair((1.0, 1.0), (0.3, 0.2), (0.5, -0.5), 1.0, 1.0);
        assert_abs_diff_eq!(a_i + a_j, 0.5, epsilon = 1e-12);
        assert_eq!(a_i, 0.0);
    }
}
