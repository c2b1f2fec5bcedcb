//! Manual 4-corner calibration.
//!
//! The user taps the four reference corners in the camera view, in the order
//! top-left, top-right, bottom-right, bottom-left. Taps are frame-normalized
//! (`[0, 1]` across the camera frame); the result maps frame-normalized
//! points to reference-normalized points.

use nalgebra::Matrix3;

use crate::homography::{invert, is_finite_point, project, solve_from_four_points, HomographyError};

/// Reference corners in tap order: TL, TR, BR, BL.
pub const REFERENCE_CORNERS: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration already has 4 taps; reset before tapping again")]
    TooManyTaps,
    #[error("tap is not a finite point: ({x}, {y})")]
    NonFiniteTap { x: f64, y: f64 },
    #[error("taps do not define a usable homography: {0}")]
    Homography(#[from] HomographyError),
}

/// Frame-normalized → reference-normalized homography from four corner taps.
pub fn homography_from_taps(taps: &[[f64; 2]; 4]) -> Result<Matrix3<f64>, CalibrationError> {
    let reference_to_frame = solve_from_four_points(&REFERENCE_CORNERS, taps)?;
    Ok(invert(&reference_to_frame)?)
}

/// Tap collector holding the current calibration, if complete.
#[derive(Debug, Clone, Default)]
pub struct ManualCalibration {
    taps: Vec<[f64; 2]>,
    frame_to_reference: Option<Matrix3<f64>>,
}

impl ManualCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tap. The fourth tap computes the homography.
    ///
    /// A tap that would make the corner quad degenerate is rejected; taps and
    /// the previous homography stay as they were.
    pub fn add_tap(&mut self, x: f64, y: f64) -> Result<(), CalibrationError> {
        if self.taps.len() >= 4 {
            return Err(CalibrationError::TooManyTaps);
        }
        if !is_finite_point(&[x, y]) {
            return Err(CalibrationError::NonFiniteTap { x, y });
        }

        if self.taps.len() == 3 {
            let taps = [self.taps[0], self.taps[1], self.taps[2], [x, y]];
            let h = homography_from_taps(&taps)?;
            self.frame_to_reference = Some(h);
            tracing::debug!("manual calibration complete: taps={:?}", taps);
        }
        self.taps.push([x, y]);
        Ok(())
    }

    pub fn taps(&self) -> &[[f64; 2]] {
        &self.taps
    }

    pub fn is_complete(&self) -> bool {
        self.frame_to_reference.is_some()
    }

    /// Frame-normalized → reference-normalized homography.
    pub fn homography(&self) -> Option<&Matrix3<f64>> {
        self.frame_to_reference.as_ref()
    }

    /// Map a frame-normalized point; `None` without a calibration or when the
    /// point projects to infinity.
    pub fn map_point(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let h = self.frame_to_reference.as_ref()?;
        let p = project(h, x, y);
        is_finite_point(&p).then_some(p)
    }

    /// Map the frame center `(0.5, 0.5)`.
    pub fn map_center(&self) -> Option<[f64; 2]> {
        self.map_point(0.5, 0.5)
    }

    pub fn reset(&mut self) {
        self.taps.clear();
        self.frame_to_reference = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calibrated(taps: &[[f64; 2]]) -> ManualCalibration {
        let mut cal = ManualCalibration::new();
        for t in taps {
            cal.add_tap(t[0], t[1]).unwrap();
        }
        cal
    }

    #[test]
    fn inset_square_maps_center_to_center() {
        let cal = calibrated(&[[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]);
        assert!(cal.is_complete());
        let c = cal.map_center().unwrap();
        assert_relative_eq!(c[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(c[1], 0.5, epsilon = 1e-9);

        let tl = cal.map_point(0.1, 0.1).unwrap();
        assert_relative_eq!(tl[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(tl[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn skewed_quad_maps_taps_back_to_corners() {
        let taps = [[0.2, 0.15], [0.85, 0.1], [0.8, 0.95], [0.1, 0.8]];
        let cal = calibrated(&taps);
        for (tap, corner) in taps.iter().zip(REFERENCE_CORNERS) {
            let p = cal.map_point(tap[0], tap[1]).unwrap();
            assert_relative_eq!(p[0], corner[0], epsilon = 1e-9);
            assert_relative_eq!(p[1], corner[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn incomplete_calibration_maps_nothing() {
        let cal = calibrated(&[[0.1, 0.1], [0.9, 0.1]]);
        assert!(!cal.is_complete());
        assert_eq!(cal.map_center(), None);
        assert_eq!(cal.taps().len(), 2);
    }

    #[test]
    fn fifth_tap_is_rejected() {
        let mut cal = calibrated(&[[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]);
        assert_eq!(cal.add_tap(0.5, 0.5), Err(CalibrationError::TooManyTaps));
        assert_eq!(cal.taps().len(), 4);
    }

    #[test]
    fn degenerate_fourth_tap_leaves_state_unchanged() {
        let mut cal = calibrated(&[[0.1, 0.1], [0.9, 0.1], [0.9, 0.9]]);
        // Collinear with the first two taps.
        let err = cal.add_tap(0.5, 0.1).unwrap_err();
        assert!(matches!(err, CalibrationError::Homography(_)));
        assert_eq!(cal.taps().len(), 3);
        assert!(!cal.is_complete());

        cal.add_tap(0.1, 0.9).unwrap();
        assert!(cal.is_complete());
    }

    #[test]
    fn non_finite_tap_is_rejected() {
        let mut cal = ManualCalibration::new();
        assert!(matches!(
            cal.add_tap(f64::NAN, 0.2),
            Err(CalibrationError::NonFiniteTap { .. })
        ));
        assert!(cal.taps().is_empty());
    }

    #[test]
    fn reset_clears_taps_and_homography() {
        let mut cal = calibrated(&[[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]);
        cal.reset();
        assert!(cal.taps().is_empty());
        assert!(cal.homography().is_none());
    }
}
