use image::imageops::FilterType;
use image::{GrayImage, Luma};
use planelock::{FastBriefBackend, LockConfig, LockEngine, LockResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn block_texture(w: u32, h: u32, block: u32, seed: u64) -> GrayImage {
    let cols = w.div_ceil(block);
    let mut rng = StdRng::seed_from_u64(seed);
    let tiles: Vec<u8> = (0..cols * h.div_ceil(block))
        .map(|_| rng.gen_range(0..=255))
        .collect();
    GrayImage::from_fn(w, h, |x, y| Luma([tiles[((y / block) * cols + x / block) as usize]]))
}

fn engine_for(reference: &GrayImage) -> LockEngine<FastBriefBackend> {
    let mut engine = LockEngine::new(FastBriefBackend::default(), LockConfig::default());
    engine.init(reference).expect("textured reference");
    engine
}

fn assert_locked_at(r: &LockResult, x: f64, y: f64) {
    assert!(r.locked, "expected lock, got {r:?}");
    assert!((r.mapped_x - x).abs() < 0.01, "mapped_x {} vs {}", r.mapped_x, x);
    assert!((r.mapped_y - y).abs() < 0.01, "mapped_y {} vs {}", r.mapped_y, y);
}

#[test]
fn identical_view_locks_on_reference_center() {
    let reference = block_texture(320, 240, 8, 21);
    let mut engine = engine_for(&reference);
    assert!(engine.reference().unwrap().features().len() > 50);

    let r = engine.process(&reference, 0);
    assert_locked_at(&r, 0.5, 0.5);
    assert!(!r.stale);
    assert!(r.matches >= 18);
    assert!(r.inliers >= 14);
}

#[test]
fn reference_at_twice_analysis_size_locks() {
    let reference = block_texture(640, 480, 16, 33);
    let mut engine = engine_for(&reference);
    assert_eq!(engine.reference().unwrap().described_size(), (320, 240));

    let frame = image::imageops::resize(&reference, 320, 240, FilterType::Triangle);
    let r = engine.process(&frame, 0);
    assert_locked_at(&r, 0.5, 0.5);
    assert!(r.inliers >= 14);

    // Full-resolution frames are resampled to the same scale.
    let r = engine.process(&reference, 1_000);
    assert_locked_at(&r, 0.5, 0.5);
}

#[test]
fn shifted_view_locks_on_offset_center() {
    let reference = block_texture(640, 480, 16, 47);
    let mut frame = GrayImage::from_pixel(640, 480, Luma([128]));
    image::imageops::overlay(&mut frame, &reference, 64, 48);
    let mut engine = engine_for(&reference);

    let r = engine.process(&frame, 0);
    // Frame center (320, 240) sits at reference (256, 192).
    assert_locked_at(&r, 256.0 / 640.0, 192.0 / 480.0);
}

#[test]
fn flat_frame_never_locks() {
    let reference = block_texture(320, 240, 8, 21);
    let mut engine = engine_for(&reference);
    let flat = GrayImage::from_pixel(320, 240, Luma([90]));

    let r = engine.process(&flat, 0);
    assert!(!r.locked);
    assert_eq!(r.inliers, 0);
}

#[test]
fn lock_survives_dropout_for_hold_window() {
    let reference = block_texture(320, 240, 8, 21);
    let mut engine = engine_for(&reference);
    let flat = GrayImage::from_pixel(320, 240, Luma([90]));

    assert!(engine.process(&reference, 1_000).locked);

    let held = engine.process(&flat, 1_300);
    assert_locked_at(&held, 0.5, 0.5);
    assert!(held.stale);

    assert!(!engine.process(&flat, 1_900).locked);
}
