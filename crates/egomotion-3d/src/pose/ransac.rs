use rand::{rngs::StdRng, Rng, SeedableRng};

use super::essential::{essential_8point, sampson_distance, MIN_CORRESPONDENCES};

/// Errors returned by robust model estimation.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RansacError {
    /// Fewer correspondences than the minimal sample size.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimal sample size.
        required: usize,
        /// Number of correspondences supplied.
        actual: usize,
    },
    /// The two point sets differ in length.
    #[error("Point sets have different lengths: {0} and {1}")]
    MismatchedLengths(usize, usize),
    /// A parameter is out of range.
    #[error("Invalid RANSAC parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// No trial produced a model.
    #[error("RANSAC failed to find a valid model in {0} iterations")]
    DegenerateEstimation(usize),
}

/// Parameters for RANSAC model estimation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Number of random minimal samples to try.
    pub max_iterations: usize,
    /// Sampson distance an inlier must stay below, in normalized image units.
    pub threshold: f64,
    /// Optional RNG seed for deterministic runs.
    pub random_seed: Option<u64>,
    /// Refit the best model on all of its inliers.
    pub refine: bool,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            threshold: 0.005,
            random_seed: None,
            refine: true,
        }
    }
}

impl RansacParams {
    /// Check that the parameters are in range.
    pub fn validate(&self) -> Result<(), RansacError> {
        if self.max_iterations == 0 {
            return Err(RansacError::InvalidParameter {
                name: "max_iterations",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(RansacError::InvalidParameter {
                name: "threshold",
                reason: format!("must be positive and finite, got {}", self.threshold),
            });
        }
        Ok(())
    }

    /// Create the random generator described by `random_seed`.
    pub fn rng(&self) -> StdRng {
        match self.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                let mut tr = rand::rng();
                StdRng::from_rng(&mut tr)
            }
        }
    }
}

/// Result of a RANSAC model fit.
#[derive(Clone, Debug, PartialEq)]
pub struct RansacResult<M> {
    /// Estimated model.
    pub model: M,
    /// Per-point inlier mask.
    pub inliers: Vec<bool>,
    /// Total inlier count.
    pub inlier_count: usize,
    /// Sum of inlier errors (lower is better).
    pub score: f64,
}

/// Estimate an essential matrix with RANSAC using the 8-point solver.
///
/// Each trial fits a model to 8 distinct correspondences drawn from `rng`; trials whose sample
/// is degenerate are skipped. A correspondence is an inlier when its Sampson distance is
/// below `threshold`. The first model reaching the largest inlier count wins. With `refine`
/// set, the winner is refitted on all its inliers; the inlier mask is the one of the winning
/// trial.
///
/// # Arguments
///
/// * `x1` - Normalized points in the current view.
/// * `x2` - Corresponding normalized points in the previous view.
/// * `params` - RANSAC parameters; `random_seed` is ignored in favour of `rng`.
/// * `rng` - Source of the random samples.
///
/// # Returns
///
/// A model `E` with `x2^T * E * x1 ~ 0` on the inliers.
pub fn ransac_essential<R: Rng + ?Sized>(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    params: &RansacParams,
    rng: &mut R,
) -> Result<RansacResult<[[f64; 3]; 3]>, RansacError> {
    params.validate()?;
    if x1.len() != x2.len() {
        return Err(RansacError::MismatchedLengths(x1.len(), x2.len()));
    }
    let n = x1.len();
    if n < MIN_CORRESPONDENCES {
        return Err(RansacError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: n,
        });
    }

    let mut best: Option<RansacResult<[[f64; 3]; 3]>> = None;
    let mut s1 = Vec::with_capacity(MIN_CORRESPONDENCES);
    let mut s2 = Vec::with_capacity(MIN_CORRESPONDENCES);

    for _ in 0..params.max_iterations {
        let sample = rand::seq::index::sample(rng, n, MIN_CORRESPONDENCES);
        s1.clear();
        s2.clear();
        for idx in sample.iter() {
            s1.push(x1[idx]);
            s2.push(x2[idx]);
        }

        let e = match essential_8point(&s1, &s2) {
            Ok(e) => e,
            Err(_) => continue,
        };

        let candidate = score_model(e, x1, x2, params.threshold);
        let improves = best
            .as_ref()
            .map_or(true, |b| candidate.inlier_count > b.inlier_count);
        if improves {
            best = Some(candidate);
        }
    }

    let mut best = best.ok_or(RansacError::DegenerateEstimation(params.max_iterations))?;

    if params.refine && best.inlier_count >= MIN_CORRESPONDENCES {
        let (r1, r2): (Vec<_>, Vec<_>) = x1
            .iter()
            .zip(x2.iter())
            .zip(best.inliers.iter())
            .filter(|(_, &inlier)| inlier)
            .map(|((p1, p2), _)| (*p1, *p2))
            .unzip();
        match essential_8point(&r1, &r2) {
            Ok(e) => best.model = e,
            Err(err) => log::debug!("keeping sampled model, refit failed: {err}"),
        }
    }

    log::debug!(
        "ransac: {}/{} inliers after {} iterations",
        best.inlier_count,
        n,
        params.max_iterations
    );

    Ok(best)
}

fn score_model(
    e: [[f64; 3]; 3],
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    threshold: f64,
) -> RansacResult<[[f64; 3]; 3]> {
    let mut inliers = vec![false; x1.len()];
    let mut inlier_count = 0usize;
    let mut score = 0.0f64;
    for (i, (p1, p2)) in x1.iter().zip(x2.iter()).enumerate() {
        let d = sampson_distance(&e, p1, p2);
        if d < threshold {
            inliers[i] = true;
            inlier_count += 1;
            score += d;
        }
    }

    RansacResult {
        model: e,
        inliers,
        inlier_count,
        score,
    }
}
