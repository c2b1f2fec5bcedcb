//! Homography statistics and format conversion.

use std::cmp::Ordering;

use nalgebra::Matrix3;

use super::ransac::RansacHomographyResult;

/// RANSAC statistics for a homography fit.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RansacStats {
    /// Number of correspondences fed to RANSAC.
    pub n_candidates: usize,
    /// Number of inliers after the final refit.
    pub n_inliers: usize,
    /// Inlier threshold in destination pixels.
    pub threshold_px: f64,
    /// Mean reprojection error of inliers.
    pub mean_err_px: f64,
    /// 95th percentile reprojection error of inliers.
    pub p95_err_px: f64,
}

impl RansacStats {
    pub fn from_result(result: &RansacHomographyResult, threshold_px: f64) -> Self {
        let mut inlier_errors = collect_masked_inlier_errors(&result.errors, &result.inlier_mask);
        let (mean_err_px, p95_err_px) = mean_and_p95(&mut inlier_errors);
        Self {
            n_candidates: result.errors.len(),
            n_inliers: result.n_inliers,
            threshold_px,
            mean_err_px,
            p95_err_px,
        }
    }
}

/// Mean and P95 summary for a mutable error slice.
pub fn mean_and_p95(errors: &mut [f64]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let idx = ((errors.len() as f64 * 0.95) as usize).min(errors.len() - 1);
    (mean, errors[idx])
}

/// Errors of entries flagged in `inlier_mask`, skipping non-finite values.
pub fn collect_masked_inlier_errors(errors: &[f64], inlier_mask: &[bool]) -> Vec<f64> {
    inlier_mask
        .iter()
        .zip(errors)
        .filter_map(|(&is_inlier, &err)| (is_inlier && err.is_finite()).then_some(err))
        .collect()
}

/// Row-major nested array form, as serialized in reports.
pub fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Inverse of [`matrix3_to_array`].
pub fn array_to_matrix3(a: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        a[0][0], a[0][1], a[0][2], //
        a[1][0], a[1][1], a[1][2], //
        a[2][0], a[2][1], a[2][2],
    )
}
