//! Feature correspondence capability.
//!
//! The lock engine talks to keypoint detectors and descriptor matchers only
//! through [`FeatureBackend`]. [`FastBriefBackend`] is the bundled default;
//! any other detector/matcher pair can be swapped in without touching the
//! engine.

mod brief;
mod matcher;

use image::GrayImage;

pub use brief::{BriefDescriptor, FastBriefBackend, FastBriefConfig};
pub use matcher::knn_ratio_match;

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone)]
pub struct FeatureSet<D> {
    /// Keypoint positions in the described image's pixel frame.
    pub keypoints: Vec<[f64; 2]>,
    pub descriptors: Vec<D>,
}

impl<D> FeatureSet<D> {
    pub fn empty() -> Self {
        Self {
            keypoints: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

impl<D> Default for FeatureSet<D> {
    fn default() -> Self {
        Self::empty()
    }
}

/// A ratio-test survivor: reference feature `reference_idx` matched to query
/// feature `query_idx`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub reference_idx: usize,
    pub query_idx: usize,
    pub distance: f32,
}

/// Output of [`FeatureBackend::match_features`].
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    /// Matches that passed the ratio test.
    pub matches: Vec<FeatureMatch>,
    /// Reference features that had at least one neighbor, before the ratio
    /// test.
    pub candidates: usize,
}

/// Point correspondences assembled from a [`MatchSet`].
#[derive(Debug, Clone, Default)]
pub struct Correspondences {
    /// Reference-image pixel positions.
    pub reference_px: Vec<[f64; 2]>,
    /// Query-frame pixel positions, index-aligned with `reference_px`.
    pub frame_px: Vec<[f64; 2]>,
}

impl Correspondences {
    pub fn from_matches<D>(
        matches: &MatchSet,
        reference: &FeatureSet<D>,
        query: &FeatureSet<D>,
    ) -> Self {
        let mut out = Self {
            reference_px: Vec::with_capacity(matches.matches.len()),
            frame_px: Vec::with_capacity(matches.matches.len()),
        };
        for m in &matches.matches {
            let (Some(r), Some(q)) = (
                reference.keypoints.get(m.reference_idx),
                query.keypoints.get(m.query_idx),
            ) else {
                continue;
            };
            out.reference_px.push(*r);
            out.frame_px.push(*q);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.reference_px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference_px.is_empty()
    }
}

/// Detect-and-describe plus knn ratio-test matching.
pub trait FeatureBackend {
    type Descriptor: Clone;

    /// Extract keypoints and descriptors from a grayscale image.
    fn detect_and_describe(&self, image: &GrayImage) -> FeatureSet<Self::Descriptor>;

    /// 2-NN match every reference descriptor against `query`, keeping matches
    /// whose best distance is below `ratio` times the second best.
    fn match_features(
        &self,
        reference: &FeatureSet<Self::Descriptor>,
        query: &FeatureSet<Self::Descriptor>,
        ratio: f32,
    ) -> MatchSet;
}
