//! Homography estimation, projection, and related utilities.

mod core;
mod dlt;
mod ransac;
mod utils;

pub use self::core::{
    invert, is_finite_point, project, reprojection_error, solve_from_four_points, HomographyError,
    INVERTIBLE_DET_EPS, PROJECT_DENOM_EPS, SINGULAR_PIVOT_EPS,
};
pub use dlt::estimate_homography_dlt;
pub use ransac::{
    fit_homography_ransac, RansacHomographyConfig, RansacHomographyResult, RobustEstimator,
    RobustFit,
};
pub use utils::{array_to_matrix3, matrix3_to_array, mean_and_p95, RansacStats};
