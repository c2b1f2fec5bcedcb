//! Least-squares homography via normalized DLT, used to refit consensus sets.

use nalgebra::{DMatrix, Matrix3};

use super::core::{normalize_h22, HomographyError};

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// Estimate a homography from ≥4 correspondences using DLT.
///
/// Returns H such that `dst ≈ project(H, src)`, scaled to `h22 = 1` when
/// possible.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
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

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // 2n × 9 design matrix
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = src_n[i];
        let [dx, dy] = dst_n[i];

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of A^T A with the smallest eigenvalue.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let min_idx = (0..9)
        .min_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .total_cmp(&eig.eigenvalues[j].abs())
        })
        .unwrap_or(0);
    let v = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

    // H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "non-finite DLT solution".into(),
        ));
    }

    Ok(normalize_h22(h))
}
