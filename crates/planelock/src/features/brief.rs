//! FAST-9 keypoints with 256-bit BRIEF descriptors.
//!
//! No orientation or scale pyramid: the reference and the live frame are
//! expected to be roughly upright and at comparable scale, which holds for a
//! handheld camera framing a wall-mounted picture.

use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::matcher::knn_ratio_match;
use super::{FeatureBackend, FeatureSet, MatchSet};

/// Number of intensity comparisons per descriptor.
const BRIEF_BITS: usize = 256;

/// 256-bit binary descriptor.
pub type BriefDescriptor = [u64; 4];

/// Configuration for [`FastBriefBackend`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FastBriefConfig {
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Keep at most this many keypoints, strongest first.
    pub max_keypoints: usize,
    /// Cell size (pixels) for grid non-maximum suppression. `0` disables it.
    pub nms_cell_px: u32,
    /// Half-size of the square sampling patch (pixels).
    pub patch_radius: u32,
    /// Gaussian pre-blur applied before sampling descriptor pairs.
    pub blur_sigma: f32,
    /// Seed of the comparison-pair pattern. Reference and query must share it.
    pub pattern_seed: u64,
}

impl Default for FastBriefConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_keypoints: 900,
            nms_cell_px: 4,
            patch_radius: 15,
            blur_sigma: 2.0,
            pattern_seed: 0x0b1e_f00d,
        }
    }
}

/// Default [`FeatureBackend`]: FAST-9 corners + BRIEF + Hamming matching.
#[derive(Debug, Clone)]
pub struct FastBriefBackend {
    config: FastBriefConfig,
    pattern: Vec<([i32; 2], [i32; 2])>,
}

impl Default for FastBriefBackend {
    fn default() -> Self {
        Self::new(FastBriefConfig::default())
    }
}

impl FastBriefBackend {
    pub fn new(config: FastBriefConfig) -> Self {
        let pattern = sample_pattern(config.patch_radius, config.pattern_seed);
        Self { config, pattern }
    }

    pub fn config(&self) -> &FastBriefConfig {
        &self.config
    }

    fn detect(&self, image: &GrayImage) -> Vec<Corner> {
        let (w, h) = image.dimensions();
        let margin = self.config.patch_radius + 1;
        if w <= 2 * margin || h <= 2 * margin {
            return Vec::new();
        }

        let mut corners: Vec<Corner> = corners_fast9(image, self.config.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= margin && c.y >= margin && c.x < w - margin && c.y < h - margin)
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));

        if self.config.nms_cell_px > 0 {
            corners = suppress_in_cells(corners, w, h, self.config.nms_cell_px);
        }
        corners.truncate(self.config.max_keypoints);
        corners
    }

    fn describe(&self, smoothed: &GrayImage, x: u32, y: u32) -> BriefDescriptor {
        let mut desc = [0u64; 4];
        for (bit, (a, b)) in self.pattern.iter().enumerate() {
            let pa = smoothed.get_pixel((x as i32 + a[0]) as u32, (y as i32 + a[1]) as u32)[0];
            let pb = smoothed.get_pixel((x as i32 + b[0]) as u32, (y as i32 + b[1]) as u32)[0];
            if pa < pb {
                desc[bit / 64] |= 1u64 << (bit % 64);
            }
        }
        desc
    }
}

/// Hamming distance between two descriptors.
#[inline]
pub(crate) fn hamming(a: &BriefDescriptor, b: &BriefDescriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

impl FeatureBackend for FastBriefBackend {
    type Descriptor = BriefDescriptor;

    fn detect_and_describe(&self, image: &GrayImage) -> FeatureSet<BriefDescriptor> {
        let corners = self.detect(image);
        if corners.is_empty() {
            return FeatureSet::empty();
        }

        let smoothed = if self.config.blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(image, self.config.blur_sigma)
        } else {
            image.clone()
        };

        let mut set = FeatureSet {
            keypoints: Vec::with_capacity(corners.len()),
            descriptors: Vec::with_capacity(corners.len()),
        };
        for c in &corners {
            set.keypoints.push([c.x as f64, c.y as f64]);
            set.descriptors.push(self.describe(&smoothed, c.x, c.y));
        }
        set
    }

    fn match_features(
        &self,
        reference: &FeatureSet<BriefDescriptor>,
        query: &FeatureSet<BriefDescriptor>,
        ratio: f32,
    ) -> MatchSet {
        knn_ratio_match(&reference.descriptors, &query.descriptors, ratio, |a, b| {
            hamming(a, b) as f32
        })
    }
}

/// Seeded random comparison pairs, uniform in the patch square.
fn sample_pattern(patch_radius: u32, seed: u64) -> Vec<([i32; 2], [i32; 2])> {
    let r = patch_radius as i32;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..BRIEF_BITS)
        .map(|_| {
            (
                [rng.gen_range(-r..=r), rng.gen_range(-r..=r)],
                [rng.gen_range(-r..=r), rng.gen_range(-r..=r)],
            )
        })
        .collect()
}

/// Keep the strongest corner per `cell`×`cell` bucket. Input must be sorted
/// by descending score.
fn suppress_in_cells(corners: Vec<Corner>, w: u32, h: u32, cell: u32) -> Vec<Corner> {
    let cols = w.div_ceil(cell) as usize;
    let rows = h.div_ceil(cell) as usize;
    let mut taken = vec![false; cols * rows];
    corners
        .into_iter()
        .filter(|c| {
            let idx = (c.y / cell) as usize * cols + (c.x / cell) as usize;
            !std::mem::replace(&mut taken[idx], true)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::random_block_texture;

    #[test]
    fn flat_image_has_no_features() {
        let backend = FastBriefBackend::default();
        let img = GrayImage::from_pixel(320, 240, image::Luma([128]));
        assert!(backend.detect_and_describe(&img).is_empty());
    }

    #[test]
    fn tiny_image_has_no_features() {
        let backend = FastBriefBackend::default();
        let img = random_block_texture(20, 20, 4, 1);
        assert!(backend.detect_and_describe(&img).is_empty());
    }

    #[test]
    fn textured_image_yields_bounded_aligned_features() {
        let backend = FastBriefBackend::new(FastBriefConfig {
            max_keypoints: 100,
            ..Default::default()
        });
        let img = random_block_texture(320, 240, 8, 3);
        let set = backend.detect_and_describe(&img);
        assert!(!set.is_empty());
        assert!(set.len() <= 100);
        assert_eq!(set.keypoints.len(), set.descriptors.len());
        for kp in &set.keypoints {
            assert!(kp[0] >= 16.0 && kp[0] < 304.0);
            assert!(kp[1] >= 16.0 && kp[1] < 224.0);
        }
    }

    #[test]
    fn identical_images_match_onto_themselves() {
        let backend = FastBriefBackend::default();
        let img = random_block_texture(320, 240, 8, 11);
        let set = backend.detect_and_describe(&img);
        let matches = backend.match_features(&set, &set, 0.75);
        assert!(matches.matches.len() > 20, "{} matches", matches.matches.len());
        for m in &matches.matches {
            assert_eq!(m.reference_idx, m.query_idx);
            assert_eq!(m.distance, 0.0);
        }
    }

    #[test]
    fn pattern_is_seed_deterministic() {
        assert_eq!(sample_pattern(15, 5), sample_pattern(15, 5));
        assert_ne!(sample_pattern(15, 5), sample_pattern(15, 6));
        assert!(sample_pattern(15, 5)
            .iter()
            .all(|(a, b)| a.iter().chain(b).all(|v| v.abs() <= 15)));
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let a = [0u64, 0, 0, 0];
        let b = [0b1011u64, 0, 0, 1 << 63];
        assert_eq!(hamming(&a, &b), 4);
        assert_eq!(hamming(&b, &b), 0);
    }

    #[test]
    fn cell_suppression_keeps_first_per_bucket() {
        let corners = vec![
            Corner::new(1, 1, 9.0),
            Corner::new(2, 2, 5.0),
            Corner::new(9, 1, 4.0),
        ];
        let kept = suppress_in_cells(corners, 16, 16, 4);
        assert_eq!(kept.len(), 2);
        assert_eq!((kept[0].x, kept[0].y), (1, 1));
        assert_eq!((kept[1].x, kept[1].y), (9, 1));
    }
}
