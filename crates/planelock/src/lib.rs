//! planelock — camera-to-painting planar lock and zone triggering.
//!
//! A handheld camera frames a known flat picture. The pipeline stages are:
//!
//! 1. **Features** – keypoints and binary descriptors, 2-NN ratio matching.
//! 2. **Homography** – exact 4-point solve, RANSAC with a normalized-DLT refit.
//! 3. **Lock** – rate-limited estimation with a hold window; the center of
//!    the camera view is projected into reference-normalized coordinates.
//! 4. **Calibration** – the same mapping from four manual corner taps.
//! 5. **Zones** – circular regions of the painting, each tagged with a role.
//! 6. **Trigger** – cooldown/repeat debounce turning zone hits into events.
//!
//! # Public API
//! - [`LockEngine`] with [`LockConfig`], producing [`LockResult`]
//! - [`FeatureBackend`] and the bundled [`FastBriefBackend`]
//! - [`ManualCalibration`]
//! - [`PaintingPack`], [`Scanner`], [`TriggerController`], [`TriggerSink`]

pub mod calibration;
pub mod features;
pub mod homography;
pub mod lock;
pub mod scanner;
pub mod trigger;
pub mod zones;

#[cfg(test)]
pub(crate) mod test_utils;

pub use calibration::{homography_from_taps, CalibrationError, ManualCalibration};
pub use features::{FastBriefBackend, FastBriefConfig, FeatureBackend, FeatureSet, MatchSet};
pub use homography::{HomographyError, RansacHomographyConfig, RobustEstimator};
pub use lock::{LockConfig, LockEngine, LockError, ReferenceModel};
pub use scanner::{ScanOutcome, Scanner};
pub use trigger::{TriggerConfig, TriggerController, TriggerSink};
pub use zones::{find_zone, PackError, PaintingPack, Zone, ZoneRole};

/// Per-tick lock output.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LockResult {
    pub locked: bool,
    /// Reference-normalized x of the camera center, in `[0, 1]`. Meaningful
    /// only when `locked`.
    pub mapped_x: f64,
    /// Reference-normalized y of the camera center, in `[0, 1]`.
    pub mapped_y: f64,
    /// RANSAC inliers of the estimate behind this result (0 when stale).
    pub inliers: usize,
    /// Ratio-test survivors of the estimate behind this result (0 when stale).
    pub matches: usize,
    /// The point was reprojected through a held homography rather than a
    /// fresh estimate.
    pub stale: bool,
}

impl LockResult {
    pub fn unlocked(matches: usize, inliers: usize) -> Self {
        Self {
            matches,
            inliers,
            ..Self::default()
        }
    }

    /// `[x, y]` when locked.
    pub fn mapped_point(&self) -> Option<[f64; 2]> {
        self.locked.then_some([self.mapped_x, self.mapped_y])
    }
}
