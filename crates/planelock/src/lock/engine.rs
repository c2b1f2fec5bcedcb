//! Rate-limited planar lock with a hold window.
//!
//! [`LockEngine`] is created once, initialized once with the reference image,
//! then polled every render tick. Only ticks spaced at least
//! `poll_interval_ms` apart run feature matching and robust estimation; the
//! ticks in between reproject the fixed analysis center through the last
//! accepted homography while the hold window lasts.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::GrayImage;
use nalgebra::Matrix3;

use crate::features::{Correspondences, FeatureBackend, FeatureSet, MatchSet};
use crate::homography::{
    invert, is_finite_point, project, HomographyError, RansacHomographyConfig, RobustEstimator,
};
use crate::LockResult;

use super::config::LockConfig;

/// Errors surfaced by [`LockEngine::init`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LockError {
    #[error("reference image is empty ({width}x{height})")]
    EmptyReference { width: u32, height: u32 },
}

/// Immutable reference description built once by [`LockEngine::init`].
#[derive(Debug, Clone)]
pub struct ReferenceModel<D> {
    width: u32,
    height: u32,
    described_size: (u32, u32),
    /// Keypoints in full reference pixels.
    features: FeatureSet<D>,
}

impl<D> ReferenceModel<D> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolution the reference was described at.
    pub fn described_size(&self) -> (u32, u32) {
        self.described_size
    }

    pub fn features(&self) -> &FeatureSet<D> {
        &self.features
    }

    /// Reference pixels → reference-normalized, clamped to `[0, 1]`.
    fn normalize(&self, p_ref_px: [f64; 2]) -> [f64; 2] {
        [
            (p_ref_px[0] / self.width as f64).clamp(0.0, 1.0),
            (p_ref_px[1] / self.height as f64).clamp(0.0, 1.0),
        ]
    }
}

/// Last accepted estimate. Replaced as a whole value, never patched.
#[derive(Debug, Clone, Copy)]
struct LockState {
    /// Analysis-frame pixels → reference pixels.
    frame_to_reference: Matrix3<f64>,
    hold_until_ms: u64,
    analysis_size: (u32, u32),
}

impl LockState {
    fn analysis_center(&self) -> [f64; 2] {
        [
            self.analysis_size.0 as f64 * 0.5,
            self.analysis_size.1 as f64 * 0.5,
        ]
    }
}

/// Why a fresh estimation attempt did not produce a lock.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("too few matches ({found} < {needed})")]
    TooFewMatches { found: usize, needed: usize },
    #[error("estimation failed: {0}")]
    Estimation(HomographyError),
    #[error("too few inliers ({found} < {needed})")]
    TooFewInliers { found: usize, needed: usize },
    #[error("estimate not invertible: {0}")]
    NotInvertible(HomographyError),
    #[error("analysis center projects to infinity")]
    CenterAtInfinity,
}

struct Attempt {
    matches: usize,
    inliers: usize,
    outcome: Result<(LockState, [f64; 2]), Rejection>,
}

/// Planar lock engine, generic over the feature backend and the robust
/// estimator.
pub struct LockEngine<B: FeatureBackend, E: RobustEstimator = RansacHomographyConfig> {
    config: LockConfig,
    backend: B,
    estimator: E,
    reference: Option<ReferenceModel<B::Descriptor>>,
    state: Option<LockState>,
    last_attempt_ms: Option<u64>,
}

impl<B: FeatureBackend> LockEngine<B> {
    /// Engine with the default RANSAC estimator (3 px threshold).
    pub fn new(backend: B, config: LockConfig) -> Self {
        Self::with_estimator(backend, RansacHomographyConfig::default(), config)
    }
}

impl<B: FeatureBackend, E: RobustEstimator> LockEngine<B, E> {
    pub fn with_estimator(backend: B, estimator: E, config: LockConfig) -> Self {
        Self {
            config: config.sanitized(),
            backend,
            estimator,
            reference: None,
            state: None,
            last_attempt_ms: None,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Change the estimation cadence (clamped to >= 80 ms).
    pub fn set_poll_interval_ms(&mut self, interval_ms: u64) {
        self.config.set_poll_interval_ms(interval_ms);
    }

    /// Change the analysis resolution (width >= 160, 4:3).
    pub fn set_analysis_width(&mut self, width: u32) {
        self.config.set_analysis_width(width);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn reference(&self) -> Option<&ReferenceModel<B::Descriptor>> {
        self.reference.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.reference.is_some()
    }

    /// Last accepted analysis-frame → reference-pixel homography, regardless
    /// of whether its hold window has lapsed.
    pub fn last_homography(&self) -> Option<Matrix3<f64>> {
        self.state.map(|s| s.frame_to_reference)
    }

    /// Drop the lock state and rate limiter; the reference model is kept.
    pub fn reset(&mut self) {
        self.state = None;
        self.last_attempt_ms = None;
    }

    /// Build the reference model. A second call is a no-op.
    ///
    /// References larger than the analysis frame are downscaled to fit it
    /// before detection, using the analysis size in effect at this call.
    pub fn init(&mut self, reference: &GrayImage) -> Result<(), LockError> {
        if self.reference.is_some() {
            return Ok(());
        }
        let (width, height) = reference.dimensions();
        if width == 0 || height == 0 {
            return Err(LockError::EmptyReference { width, height });
        }

        // Describe at analysis scale; keypoints are stored in reference pixels.
        let (aw, ah) = self.config.analysis_size();
        let scale = (aw as f64 / width as f64)
            .min(ah as f64 / height as f64)
            .min(1.0);
        let described: Cow<'_, GrayImage> = if scale < 1.0 {
            let dw = ((width as f64 * scale).round() as u32).max(1);
            let dh = ((height as f64 * scale).round() as u32).max(1);
            Cow::Owned(imageops::resize(reference, dw, dh, FilterType::Triangle))
        } else {
            Cow::Borrowed(reference)
        };
        let described_size = described.dimensions();

        let mut features = self.backend.detect_and_describe(&described);
        let sx = width as f64 / described_size.0 as f64;
        let sy = height as f64 / described_size.1 as f64;
        for kp in &mut features.keypoints {
            kp[0] *= sx;
            kp[1] *= sy;
        }

        if features.is_empty() {
            tracing::warn!(
                "reference image {}x{} produced no features; lock will never engage",
                width,
                height
            );
        } else {
            tracing::info!(
                "reference model built: {}x{} (described at {}x{}), {} features",
                width,
                height,
                described_size.0,
                described_size.1,
                features.len()
            );
        }

        self.reference = Some(ReferenceModel {
            width,
            height,
            described_size,
            features,
        });
        Ok(())
    }

    /// Per-tick entry point. Never fails; every problem maps to an unlocked
    /// result.
    pub fn process(&mut self, frame: &GrayImage, now_ms: u64) -> LockResult {
        let Some(reference) = self.reference.as_ref() else {
            tracing::trace!("process called before init");
            return LockResult::unlocked(0, 0);
        };

        let due = match self.last_attempt_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.poll_interval_ms,
            None => true,
        };
        if !due {
            return self.held(now_ms).unwrap_or_default();
        }

        let (fw, fh) = frame.dimensions();
        if fw == 0 || fh == 0 {
            tracing::debug!("empty frame ({}x{}) ignored", fw, fh);
            return LockResult::unlocked(0, 0);
        }
        self.last_attempt_ms = Some(now_ms);

        let attempt = self.attempt(reference, frame, now_ms);
        match attempt.outcome {
            Ok((state, [mapped_x, mapped_y])) => {
                self.state = Some(state);
                tracing::debug!(
                    "lock accepted: matches={} inliers={} mapped=({:.3}, {:.3})",
                    attempt.matches,
                    attempt.inliers,
                    mapped_x,
                    mapped_y
                );
                LockResult {
                    locked: true,
                    mapped_x,
                    mapped_y,
                    inliers: attempt.inliers,
                    matches: attempt.matches,
                    stale: false,
                }
            }
            Err(reason) => {
                tracing::debug!(
                    "lock attempt rejected: {} (matches={} inliers={})",
                    reason,
                    attempt.matches,
                    attempt.inliers
                );
                match self.held(now_ms) {
                    Some(held) => LockResult {
                        matches: attempt.matches,
                        ..held
                    },
                    None => LockResult::unlocked(attempt.matches, attempt.inliers),
                }
            }
        }
    }

    /// Reproject the stored analysis center while the hold window lasts.
    /// Counts are zero; a failed fresh attempt fills in its match count.
    fn held(&self, now_ms: u64) -> Option<LockResult> {
        let state = self.state.as_ref()?;
        if now_ms >= state.hold_until_ms {
            return None;
        }
        let reference = self.reference.as_ref()?;

        let c = state.analysis_center();
        let p = project(&state.frame_to_reference, c[0], c[1]);
        if !is_finite_point(&p) {
            return None;
        }
        let [mapped_x, mapped_y] = reference.normalize(p);
        tracing::trace!(
            "held lock: mapped=({:.3}, {:.3}), {} ms left",
            mapped_x,
            mapped_y,
            state.hold_until_ms - now_ms
        );
        Some(LockResult {
            locked: true,
            mapped_x,
            mapped_y,
            inliers: 0,
            matches: 0,
            stale: true,
        })
    }

    fn attempt(
        &self,
        reference: &ReferenceModel<B::Descriptor>,
        frame: &GrayImage,
        now_ms: u64,
    ) -> Attempt {
        let (aw, ah) = self.config.analysis_size();
        let analysis: Cow<'_, GrayImage> = if frame.dimensions() == (aw, ah) {
            Cow::Borrowed(frame)
        } else {
            Cow::Owned(imageops::resize(frame, aw, ah, FilterType::Triangle))
        };

        let query = self.backend.detect_and_describe(&analysis);
        let match_set = if query.is_empty() || reference.features.is_empty() {
            MatchSet::default()
        } else {
            self.backend
                .match_features(&reference.features, &query, self.config.ratio)
        };
        let corr = Correspondences::from_matches(&match_set, &reference.features, &query);
        let matches = corr.len();

        let reject = |inliers: usize, reason: Rejection| Attempt {
            matches,
            inliers,
            outcome: Err(reason),
        };

        if matches < self.config.min_matches {
            return reject(
                0,
                Rejection::TooFewMatches {
                    found: matches,
                    needed: self.config.min_matches,
                },
            );
        }

        let fit = match self.estimator.estimate(&corr.reference_px, &corr.frame_px) {
            Ok(fit) => fit,
            Err(HomographyError::InsufficientInliers { found, .. }) => {
                return reject(
                    found,
                    Rejection::TooFewInliers {
                        found,
                        needed: self.config.min_inliers,
                    },
                );
            }
            Err(e) => return reject(0, Rejection::Estimation(e)),
        };
        let inliers = fit.n_inliers;
        if let Some(stats) = &fit.stats {
            tracing::trace!(
                "estimate: {}/{} inliers, mean_err={:.2}px, p95={:.2}px",
                stats.n_inliers,
                stats.n_candidates,
                stats.mean_err_px,
                stats.p95_err_px
            );
        }
        if inliers < self.config.min_inliers {
            return reject(
                inliers,
                Rejection::TooFewInliers {
                    found: inliers,
                    needed: self.config.min_inliers,
                },
            );
        }

        let frame_to_reference = match invert(&fit.h) {
            Ok(h) => h,
            Err(e) => return reject(inliers, Rejection::NotInvertible(e)),
        };

        let state = LockState {
            frame_to_reference,
            hold_until_ms: now_ms.saturating_add(self.config.hold_ms),
            analysis_size: (aw, ah),
        };
        let c = state.analysis_center();
        let p = project(&frame_to_reference, c[0], c[1]);
        if !is_finite_point(&p) {
            return reject(inliers, Rejection::CenterAtInfinity);
        }

        Attempt {
            matches,
            inliers,
            outcome: Ok((state, reference.normalize(p))),
        }
    }
}
