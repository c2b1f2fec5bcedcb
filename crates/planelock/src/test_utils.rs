use std::cell::{Cell, RefCell};

use image::{GrayImage, Luma};
use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{FeatureBackend, FeatureMatch, FeatureSet, MatchSet};
use crate::homography::{project, HomographyError, RobustEstimator, RobustFit};

pub(crate) fn flat_frame(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([128]))
}

/// Piecewise-constant random texture with `block`×`block` tiles.
pub(crate) fn random_block_texture(w: u32, h: u32, block: u32, seed: u64) -> GrayImage {
    let block = block.max(1);
    let cols = w.div_ceil(block) as usize;
    let rows = h.div_ceil(block) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let tiles: Vec<u8> = (0..cols * rows).map(|_| rng.gen_range(0..=255)).collect();
    GrayImage::from_fn(w, h, |x, y| {
        let idx = (y / block) as usize * cols + (x / block) as usize;
        Luma([tiles[idx]])
    })
}

/// `cols`×`rows` features at cell centers of a `w`×`h` image, ids in
/// raster order.
fn grid_features(w: u32, h: u32, cols: u32, rows: u32) -> FeatureSet<u32> {
    let mut set = FeatureSet::empty();
    for j in 0..rows {
        for i in 0..cols {
            let x = (i as f64 + 0.5) * w as f64 / cols as f64;
            let y = (j as f64 + 0.5) * h as f64 / rows as f64;
            set.descriptors.push(set.keypoints.len() as u32);
            set.keypoints.push([x, y]);
        }
    }
    set
}

/// Backend with a fixed reference grid and a scripted query view.
///
/// The first `detect_and_describe` call returns the grid laid over whatever
/// image it is given (the reference, possibly downscaled); later calls return
/// whatever was last set with [`ScriptedBackend::show_through`] or
/// [`ScriptedBackend::hide`]. Descriptors are feature ids and match by
/// equality.
pub(crate) struct ScriptedBackend {
    cols: u32,
    rows: u32,
    /// Grid in full reference pixels.
    reference: FeatureSet<u32>,
    query: RefCell<FeatureSet<u32>>,
    calls: Cell<usize>,
    reference_size: Cell<Option<(u32, u32)>>,
    last_query_size: Cell<Option<(u32, u32)>>,
}

impl ScriptedBackend {
    /// `cols`×`rows` keypoints at cell centers of a `w`×`h` reference.
    pub(crate) fn grid(w: u32, h: u32, cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            reference: grid_features(w, h, cols, rows),
            query: RefCell::new(FeatureSet::empty()),
            calls: Cell::new(0),
            reference_size: Cell::new(None),
            last_query_size: Cell::new(None),
        }
    }

    /// Next queries see every reference keypoint mapped through
    /// `reference_to_frame`.
    pub(crate) fn show_through(&self, reference_to_frame: &Matrix3<f64>) {
        let view = FeatureSet {
            keypoints: self
                .reference
                .keypoints
                .iter()
                .map(|p| project(reference_to_frame, p[0], p[1]))
                .collect(),
            descriptors: self.reference.descriptors.clone(),
        };
        *self.query.borrow_mut() = view;
    }

    /// Next queries see no features.
    pub(crate) fn hide(&self) {
        *self.query.borrow_mut() = FeatureSet::empty();
    }

    /// Number of detect calls made on live frames.
    pub(crate) fn query_count(&self) -> usize {
        self.calls.get().saturating_sub(1)
    }

    pub(crate) fn last_query_size(&self) -> Option<(u32, u32)> {
        self.last_query_size.get()
    }

    /// Size of the image the reference grid was detected on.
    pub(crate) fn reference_size(&self) -> Option<(u32, u32)> {
        self.reference_size.get()
    }
}

impl FeatureBackend for ScriptedBackend {
    type Descriptor = u32;

    fn detect_and_describe(&self, image: &GrayImage) -> FeatureSet<u32> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n == 0 {
            let (w, h) = image.dimensions();
            self.reference_size.set(Some((w, h)));
            return grid_features(w, h, self.cols, self.rows);
        }
        self.last_query_size.set(Some(image.dimensions()));
        self.query.borrow().clone()
    }

    fn match_features(
        &self,
        reference: &FeatureSet<u32>,
        query: &FeatureSet<u32>,
        _ratio: f32,
    ) -> MatchSet {
        let matches = reference
            .descriptors
            .iter()
            .enumerate()
            .filter_map(|(reference_idx, id)| {
                query
                    .descriptors
                    .iter()
                    .position(|q| q == id)
                    .map(|query_idx| FeatureMatch {
                        reference_idx,
                        query_idx,
                        distance: 0.0,
                    })
            })
            .collect();
        MatchSet {
            matches,
            candidates: reference.len(),
        }
    }
}

/// Estimator that returns a settable homography with every correspondence
/// counted as an inlier.
pub(crate) struct FixedEstimator {
    h: Cell<Matrix3<f64>>,
}

impl FixedEstimator {
    pub(crate) fn new(h: Matrix3<f64>) -> Self {
        Self { h: Cell::new(h) }
    }

    pub(crate) fn set(&self, h: Matrix3<f64>) {
        self.h.set(h);
    }
}

impl RobustEstimator for FixedEstimator {
    fn estimate(&self, src: &[[f64; 2]], _dst: &[[f64; 2]]) -> Result<RobustFit, HomographyError> {
        Ok(RobustFit {
            h: self.h.get(),
            n_inliers: src.len(),
            stats: None,
        })
    }
}
