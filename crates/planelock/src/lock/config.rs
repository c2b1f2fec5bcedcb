//! Lock engine tuning and the floors applied to it.

/// Smallest accepted analysis width (pixels).
pub const MIN_ANALYSIS_WIDTH: u32 = 160;
/// Smallest accepted analysis height (pixels).
pub const MIN_ANALYSIS_HEIGHT: u32 = 120;
/// Smallest accepted estimation interval (milliseconds).
pub const MIN_POLL_INTERVAL_MS: u64 = 80;

/// Lock engine tuning.
///
/// Every field can be overridden independently; [`LockConfig::sanitized`]
/// applies the floors and re-derives the 4:3 analysis height.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Width of the resampled analysis frame (pixels, >= 160).
    pub analysis_width: u32,
    /// Height of the analysis frame; derived as `width * 3 / 4` (>= 120).
    pub analysis_height: u32,
    /// Minimum time between two estimation attempts (ms, >= 80).
    pub poll_interval_ms: u64,
    /// How long the last accepted homography stays trusted (ms).
    pub hold_ms: u64,
    /// Minimum ratio-test survivors required to attempt estimation.
    pub min_matches: usize,
    /// Minimum RANSAC inliers required to accept an estimate.
    pub min_inliers: usize,
    /// Lowe ratio used by the descriptor matcher.
    pub ratio: f32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            analysis_width: 320,
            analysis_height: 240,
            poll_interval_ms: 200,
            hold_ms: 800,
            min_matches: 18,
            min_inliers: 14,
            ratio: 0.75,
        }
    }
}

impl LockConfig {
    /// Copy with the analysis/interval floors applied.
    pub fn sanitized(mut self) -> Self {
        self.set_analysis_width(self.analysis_width);
        self.set_poll_interval_ms(self.poll_interval_ms);
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            self.ratio = LockConfig::default().ratio;
        }
        self
    }

    /// Set the analysis width; the height follows at 4:3.
    pub fn set_analysis_width(&mut self, width: u32) {
        self.analysis_width = width.max(MIN_ANALYSIS_WIDTH);
        self.analysis_height = (width.saturating_mul(3) / 4).max(MIN_ANALYSIS_HEIGHT);
    }

    pub fn set_poll_interval_ms(&mut self, interval_ms: u64) {
        self.poll_interval_ms = interval_ms.max(MIN_POLL_INTERVAL_MS);
    }

    /// Analysis frame size `(width, height)`.
    pub fn analysis_size(&self) -> (u32, u32) {
        (self.analysis_width, self.analysis_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_realtime_profile() {
        let cfg = LockConfig::default();
        assert_eq!(cfg.analysis_size(), (320, 240));
        assert_eq!(cfg.poll_interval_ms, 200);
        assert_eq!(cfg.hold_ms, 800);
        assert_eq!(cfg.min_matches, 18);
        assert_eq!(cfg.min_inliers, 14);
        assert_eq!(cfg.clone().sanitized(), cfg);
    }

    #[test]
    fn floors_are_applied() {
        let mut cfg = LockConfig::default();
        cfg.set_analysis_width(64);
        cfg.set_poll_interval_ms(10);
        assert_eq!(cfg.analysis_size(), (160, 120));
        assert_eq!(cfg.poll_interval_ms, 80);
    }

    #[test]
    fn height_follows_width_at_four_thirds() {
        let mut cfg = LockConfig::default();
        cfg.set_analysis_width(640);
        assert_eq!(cfg.analysis_size(), (640, 480));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: LockConfig = serde_json::from_str(r#"{"hold_ms": 1200, "ratio": 7.0}"#).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.hold_ms, 1200);
        assert_eq!(cfg.min_inliers, 14);
        assert_eq!(cfg.ratio, 0.75);
    }
}
