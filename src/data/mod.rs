//! Synthetic two-class data
//!
//! Two isotropic Gaussian clusters in the plane, drawn from an explicitly
//! seeded generator so that runs are reproducible.

use crate::core::{Label, Result, SVMError, Sample, SparseVector, NEGATIVE, POSITIVE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Parameters of the two-blob generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobConfig {
    /// Points drawn per class
    pub per_class: usize,
    /// Center of the negative class
    pub negative_center: [f64; 2],
    /// Center of the positive class
    pub positive_center: [f64; 2],
    /// Standard deviation of each coordinate
    pub noise: f64,
    pub seed: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            per_class: 100,
            negative_center: [-2.0, -2.0],
            positive_center: [2.0, 2.0],
            noise: 0.5,
            seed: 42,
        }
    }
}

impl BlobConfig {
    pub fn with_per_class(mut self, per_class: usize) -> Self {
        self.per_class = per_class;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Labeled and unlabeled parts of a generated data set
#[derive(Debug, Clone)]
pub struct Split {
    pub labeled: Vec<Sample<SparseVector>>,
    /// Samples to be used as unlabeled input; labels hold the ground truth
    pub unlabeled: Vec<Sample<SparseVector>>,
}

/// Draw `per_class` points around each center, alternating classes
pub fn gaussian_blobs(config: &BlobConfig) -> Result<Vec<Sample<SparseVector>>> {
    if !config.noise.is_finite() || config.noise < 0.0 {
        return Err(SVMError::InvalidParameter(format!(
            "noise must be non-negative, got {}",
            config.noise
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples = Vec::with_capacity(2 * config.per_class);

    for _ in 0..config.per_class {
        for (center, label) in [
            (config.negative_center, NEGATIVE),
            (config.positive_center, POSITIVE),
        ] {
            let x = center[0] + config.noise * standard_normal(&mut rng);
            let y = center[1] + config.noise * standard_normal(&mut rng);
            samples.push(Sample::new(SparseVector::dense(&[x, y]), label));
        }
    }

    Ok(samples)
}

/// Keep the first `per_class` samples of each class labeled
pub fn split_labeled(samples: Vec<Sample<SparseVector>>, per_class: usize) -> Split {
    let mut taken = [0usize; 2];
    let mut split = Split {
        labeled: Vec::new(),
        unlabeled: Vec::new(),
    };

    for sample in samples {
        let slot = class_slot(sample.label);
        if taken[slot] < per_class {
            taken[slot] += 1;
            split.labeled.push(sample);
        } else {
            split.unlabeled.push(sample);
        }
    }

    split
}

fn class_slot(label: Label) -> usize {
    usize::from(label == POSITIVE)
}

/// Box-Muller draw from N(0, 1)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
