//! Exact plane-to-plane homography math.
//!
//! Provides:
//! - 4-point interpolating solve (8×8 Gaussian elimination, partial pivoting).
//! - Point projection with a finite-denominator guard.
//! - Adjugate inversion with a determinant floor.

use nalgebra::{Matrix3, SMatrix, Vector3};

/// Smallest pivot magnitude accepted by the 4-point solver.
pub const SINGULAR_PIVOT_EPS: f64 = 1e-12;
/// Smallest determinant magnitude accepted by [`invert`].
pub const INVERTIBLE_DET_EPS: f64 = 1e-12;
/// Smallest projective denominator accepted by [`project`].
pub const PROJECT_DENOM_EPS: f64 = 1e-9;

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("source and destination lengths differ: {src} vs {dst}")]
    LengthMismatch { src: usize, dst: usize },
    #[error("singular system: best pivot {pivot:.3e} below floor (degenerate points)")]
    SingularSystem { pivot: f64 },
    #[error("homography not invertible: |det| = {det:.3e}")]
    NotInvertible { det: f64 },
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers { needed: usize, found: usize },
}

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
///
/// Returns `[NaN, NaN]` when the point maps to infinity.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if !(p[2].abs() >= PROJECT_DENOM_EPS) {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Reprojection error: ||project(H, src) - dst||.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    (dx * dx + dy * dy).sqrt()
}

/// `true` when both coordinates are finite.
#[inline]
pub fn is_finite_point(p: &[f64; 2]) -> bool {
    p[0].is_finite() && p[1].is_finite()
}

// ── 4-point solve ────────────────────────────────────────────────────────

/// Homography mapping exactly `src[i]` to `dst[i]` for the 4 given pairs.
///
/// Unknowns are `[h00, h01, h02, h10, h11, h12, h20, h21]` with `h22 = 1`.
/// Fails with [`HomographyError::SingularSystem`] when 3 or more points are
/// collinear or duplicated.
pub fn solve_from_four_points(
    src: &[[f64; 2]; 4],
    dst: &[[f64; 2]; 4],
) -> Result<Matrix3<f64>, HomographyError> {
    // Augmented 8×9 system [A | b].
    let mut m = SMatrix::<f64, 8, 9>::zeros();
    for i in 0..4 {
        let [x, y] = src[i];
        let [u, v] = dst[i];

        // h00 x + h01 y + h02 - u h20 x - u h21 y = u
        let r = 2 * i;
        m[(r, 0)] = x;
        m[(r, 1)] = y;
        m[(r, 2)] = 1.0;
        m[(r, 6)] = -u * x;
        m[(r, 7)] = -u * y;
        m[(r, 8)] = u;

        // h10 x + h11 y + h12 - v h20 x - v h21 y = v
        let r = 2 * i + 1;
        m[(r, 3)] = x;
        m[(r, 4)] = y;
        m[(r, 5)] = 1.0;
        m[(r, 6)] = -v * x;
        m[(r, 7)] = -v * y;
        m[(r, 8)] = v;
    }

    let x = gauss_jordan_solve(&mut m)?;
    Ok(Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    ))
}

fn gauss_jordan_solve(m: &mut SMatrix<f64, 8, 9>) -> Result<[f64; 8], HomographyError> {
    const N: usize = 8;
    for col in 0..N {
        let mut pivot = col;
        for r in (col + 1)..N {
            if m[(r, col)].abs() > m[(pivot, col)].abs() {
                pivot = r;
            }
        }
        let best = m[(pivot, col)].abs();
        if !(best >= SINGULAR_PIVOT_EPS) {
            return Err(HomographyError::SingularSystem { pivot: best });
        }
        if pivot != col {
            m.swap_rows(pivot, col);
        }

        let div = m[(col, col)];
        for c in col..=N {
            m[(col, c)] /= div;
        }

        for r in 0..N {
            if r == col {
                continue;
            }
            let factor = m[(r, col)];
            if factor == 0.0 {
                continue;
            }
            for c in col..=N {
                m[(r, c)] -= factor * m[(col, c)];
            }
        }
    }

    let mut out = [0.0f64; N];
    for (i, v) in out.iter_mut().enumerate() {
        *v = m[(i, N)];
    }
    Ok(out)
}

// ── Inversion ────────────────────────────────────────────────────────────

/// Invert a homography via the classical adjugate / determinant formula.
pub fn invert(h: &Matrix3<f64>) -> Result<Matrix3<f64>, HomographyError> {
    let (a, b, c) = (h[(0, 0)], h[(0, 1)], h[(0, 2)]);
    let (d, e, f) = (h[(1, 0)], h[(1, 1)], h[(1, 2)]);
    let (g, hh, i) = (h[(2, 0)], h[(2, 1)], h[(2, 2)]);

    let c00 = e * i - f * hh;
    let c01 = -(d * i - f * g);
    let c02 = d * hh - e * g;
    let c10 = -(b * i - c * hh);
    let c11 = a * i - c * g;
    let c12 = -(a * hh - b * g);
    let c20 = b * f - c * e;
    let c21 = -(a * f - c * d);
    let c22 = a * e - b * d;

    let det = a * c00 + b * c01 + c * c02;
    if !(det.abs() >= INVERTIBLE_DET_EPS) {
        return Err(HomographyError::NotInvertible { det });
    }

    let inv_det = 1.0 / det;
    // Adjugate is the transposed cofactor matrix.
    Ok(Matrix3::new(
        c00, c10, c20, //
        c01, c11, c21, //
        c02, c12, c22,
    ) * inv_det)
}

/// Scale `h` so that `h22 = 1` when that entry is not vanishingly small.
pub(crate) fn normalize_h22(h: Matrix3<f64>) -> Matrix3<f64> {
    let s = h[(2, 2)];
    if s.abs() > 1e-12 {
        h / s
    } else {
        h
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
