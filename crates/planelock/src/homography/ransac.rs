//! RANSAC wrapper for outlier-robust homography fitting.

use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::core::{
    reprojection_error, solve_from_four_points, HomographyError, INVERTIBLE_DET_EPS,
};
use super::dlt::estimate_homography_dlt;
use super::utils::RansacStats;

/// RANSAC configuration for homography fitting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacHomographyConfig {
    /// Maximum number of RANSAC iterations.
    pub max_iters: usize,
    /// Inlier threshold (reprojection error in destination pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
    /// Target probability of drawing at least one all-inlier sample; drives
    /// the adaptive iteration bound. `0` disables adaptation.
    pub confidence: f64,
    /// Random seed.
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 500,
            inlier_threshold: 3.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Result of RANSAC homography fitting.
#[derive(Debug, Clone)]
pub struct RansacHomographyResult {
    /// The fitted src → dst homography.
    pub h: Matrix3<f64>,
    /// Boolean mask: true for inliers.
    pub inlier_mask: Vec<bool>,
    /// Number of inliers.
    pub n_inliers: usize,
    /// Per-correspondence reprojection errors under `h`.
    pub errors: Vec<f64>,
    /// Iterations actually run.
    pub iters: usize,
}

/// Outcome of a robust src → dst estimation.
#[derive(Debug, Clone)]
pub struct RobustFit {
    pub h: Matrix3<f64>,
    pub n_inliers: usize,
    /// Residual summary, when the estimator tracks one.
    pub stats: Option<RansacStats>,
}

/// Robust homography estimation capability.
///
/// The lock engine only needs a transform plus its consensus size; any
/// estimator (RANSAC, LMedS, MAGSAC, ...) can stand in.
pub trait RobustEstimator {
    fn estimate(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<RobustFit, HomographyError>;
}

impl RobustEstimator for RansacHomographyConfig {
    fn estimate(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<RobustFit, HomographyError> {
        let result = fit_homography_ransac(src, dst, self)?;
        Ok(RobustFit {
            stats: Some(RansacStats::from_result(&result, self.inlier_threshold)),
            h: result.h,
            n_inliers: result.n_inliers,
        })
    }
}

/// Relative area below which three sample points count as collinear.
const COLLINEAR_REL_EPS: f64 = 1e-6;

/// Iteration bound for the current inlier ratio.
fn adaptive_iterations(
    confidence: f64,
    inlier_ratio: f64,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(4)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n_iter = ((1.0 - confidence.min(1.0 - 1e-12)).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

/// Signed doubled area of triangle `abc`, or `None` when the three points are
/// (nearly) collinear or coincident.
fn triangle_orientation(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<f64> {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ac = [c[0] - a[0], c[1] - a[1]];
    let cross = ab[0] * ac[1] - ab[1] * ac[0];
    let scale = ab[0].hypot(ab[1]) * ac[0].hypot(ac[1]);
    (cross.abs() > COLLINEAR_REL_EPS * scale).then_some(cross)
}

/// A minimal sample can only come from a proper homography when no three
/// points are collinear on either side and every triangle keeps (or every
/// triangle flips) its orientation.
fn sample_is_valid(s4: &[[f64; 2]; 4], d4: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    let mut flipped = 0;
    for [i, j, k] in TRIPLES {
        let (Some(a), Some(b)) = (
            triangle_orientation(s4[i], s4[j], s4[k]),
            triangle_orientation(d4[i], d4[j], d4[k]),
        ) else {
            return false;
        };
        if (a < 0.0) != (b < 0.0) {
            flipped += 1;
        }
    }
    flipped == 0 || flipped == TRIPLES.len()
}

fn count_inliers(
    h: &Matrix3<f64>,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    threshold: f64,
    mask: &mut [bool],
) -> usize {
    let mut count = 0usize;
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        // NaN errors (points at infinity) never count.
        let inlier = reprojection_error(h, s, d) < threshold;
        mask[i] = inlier;
        count += inlier as usize;
    }
    count
}

/// Fit a homography with RANSAC.
///
/// Minimal samples are solved exactly with the 4-point solver; the best
/// consensus set is refit with normalized DLT and re-scored.
pub fn fit_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacHomographyConfig,
) -> Result<RansacHomographyResult, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best_inliers = 0usize;
    let mut best_mask: Vec<bool> = vec![false; n];
    let mut best_h: Option<Matrix3<f64>> = None;
    let mut mask = vec![false; n];

    let mut max_iters = config.max_iters;
    let mut iters = 0usize;
    while iters < max_iters {
        iters += 1;

        let sample = rand::seq::index::sample(&mut rng, n, 4);
        let s4 = [0, 1, 2, 3].map(|k| src[sample.index(k)]);
        let d4 = [0, 1, 2, 3].map(|k| dst[sample.index(k)]);

        if !sample_is_valid(&s4, &d4) {
            continue;
        }
        let Ok(h) = solve_from_four_points(&s4, &d4) else {
            continue;
        };
        if !(h.determinant().abs() >= INVERTIBLE_DET_EPS) {
            continue;
        }

        let count = count_inliers(&h, src, dst, config.inlier_threshold, &mut mask);
        if count > best_inliers {
            best_inliers = count;
            best_mask.copy_from_slice(&mask);
            best_h = Some(h);

            // Early exit if >90% inliers
            if count * 10 > n * 9 {
                break;
            }
            max_iters = adaptive_iterations(
                config.confidence,
                count as f64 / n as f64,
                iters,
                config.max_iters,
            );
        }
    }

    let Some(best_h) = best_h else {
        return Err(HomographyError::InsufficientInliers {
            needed: config.min_inliers.max(4),
            found: 0,
        });
    };
    if best_inliers < config.min_inliers.max(4) {
        return Err(HomographyError::InsufficientInliers {
            needed: config.min_inliers.max(4),
            found: best_inliers,
        });
    }

    // Refit using all inliers; keep the minimal model if the refit is worse.
    let inlier_src: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
    let inlier_dst: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();

    let mut h_final = best_h;
    if let Ok(h_refit) = estimate_homography_dlt(&inlier_src, &inlier_dst) {
        let refit_count = count_inliers(&h_refit, src, dst, config.inlier_threshold, &mut mask);
        if refit_count >= best_inliers {
            h_final = h_refit;
        }
    }

    let mut final_mask = vec![false; n];
    let n_inliers = count_inliers(&h_final, src, dst, config.inlier_threshold, &mut final_mask);
    let errors = src
        .iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(&h_final, s, d))
        .collect();

    Ok(RansacHomographyResult {
        h: h_final,
        inlier_mask: final_mask,
        n_inliers,
        errors,
        iters,
    })
}
