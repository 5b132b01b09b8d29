//! Two-sided regularization annealing

use crate::core::{Result, SVMError};

/// Doubling schedule for the pseudo-label regularization bounds
///
/// `C⁻` starts at `c_init` and `C⁺` at `c_init` scaled by the ratio of
/// positive to negative pseudo-labels. Each round yields `(C⁻ + C⁺) / 2`
/// and then doubles both bounds, clamped at the target `C`. The schedule is
/// exhausted once both bounds have reached `C`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealSchedule {
    target: f64,
    c_minus: f64,
    c_plus: f64,
}

impl AnnealSchedule {
    /// Schedule for `numplus` positive pseudo-labels among `unlabeled` samples
    pub fn new(target: f64, c_init: f64, numplus: usize, unlabeled: usize) -> Result<Self> {
        if !target.is_finite() || target <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive and finite, got {target}"
            )));
        }
        if !c_init.is_finite() || c_init <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "initial C must be positive and finite, got {c_init}"
            )));
        }

        let numminus = unlabeled.saturating_sub(numplus);
        let c_plus = if numplus == 0 || numminus == 0 {
            c_init
        } else {
            c_init * numplus as f64 / numminus as f64
        };

        Ok(Self {
            target,
            c_minus: c_init.min(target),
            c_plus: c_plus.min(target),
        })
    }

    pub fn c_minus(&self) -> f64 {
        self.c_minus
    }

    pub fn c_plus(&self) -> f64 {
        self.c_plus
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_done(&self) -> bool {
        self.c_minus >= self.target && self.c_plus >= self.target
    }

    /// Upper bound on the rounds left: `⌈log2(C / min(C⁻, C⁺))⌉ + 1`
    pub fn max_rounds(&self) -> usize {
        if self.is_done() {
            return 0;
        }
        let lowest = self.c_minus.min(self.c_plus);
        (self.target / lowest).log2().ceil() as usize + 1
    }
}

impl Iterator for AnnealSchedule {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.is_done() {
            return None;
        }
        let round = (self.c_minus + self.c_plus) / 2.0;
        self.c_minus = (self.c_minus * 2.0).min(self.target);
        self.c_plus = (self.c_plus * 2.0).min(self.target);
        Some(round)
    }
}
