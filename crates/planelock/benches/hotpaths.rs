use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use nalgebra::Matrix3;
use planelock::homography::{fit_homography_ransac, project, solve_from_four_points};
use planelock::{FastBriefBackend, FeatureBackend, LockConfig, LockEngine, RansacHomographyConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn make_texture(w: u32, h: u32, block: u32, seed: u64) -> GrayImage {
    let cols = w.div_ceil(block);
    let mut rng = StdRng::seed_from_u64(seed);
    let tiles: Vec<u8> = (0..cols * h.div_ceil(block))
        .map(|_| rng.gen_range(0..=255))
        .collect();
    GrayImage::from_fn(w, h, |x, y| Luma([tiles[((y / block) * cols + x / block) as usize]]))
}

/// Correspondences under a mild perspective; 30% are outliers.
fn make_correspondences(n: usize, seed: u64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let h = Matrix3::new(0.48, 0.03, 12.0, -0.02, 0.51, 8.0, 1.0e-4, -5.0e-5, 1.0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut src = Vec::with_capacity(n);
    let mut dst = Vec::with_capacity(n);
    for i in 0..n {
        let p = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
        let q = if i % 10 < 3 {
            [rng.gen_range(0.0..320.0), rng.gen_range(0.0..240.0)]
        } else {
            let q = project(&h, p[0], p[1]);
            [
                q[0] + rng.gen_range(-0.5..0.5),
                q[1] + rng.gen_range(-0.5..0.5),
            ]
        };
        src.push(p);
        dst.push(q);
    }
    (src, dst)
}

fn bench_four_point(c: &mut Criterion) {
    let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let dst = [[0.1, 0.12], [0.88, 0.1], [0.92, 0.9], [0.08, 0.85]];
    c.bench_function("solve_from_four_points", |b| {
        b.iter(|| black_box(solve_from_four_points(black_box(&src), black_box(&dst))))
    });
}

fn bench_ransac(c: &mut Criterion) {
    let (src, dst) = make_correspondences(200, 7);
    let cfg = RansacHomographyConfig::default();
    c.bench_function("ransac_200pts_30pct_outliers", |b| {
        b.iter(|| {
            let fit = fit_homography_ransac(black_box(&src), black_box(&dst), black_box(&cfg));
            black_box(fit.map(|r| r.n_inliers))
        })
    });
}

fn bench_fast_brief(c: &mut Criterion) {
    let img = make_texture(320, 240, 8, 99);
    let backend = FastBriefBackend::default();
    let features = backend.detect_and_describe(&img);

    c.bench_function("fast_brief_detect_320x240", |b| {
        b.iter(|| black_box(backend.detect_and_describe(black_box(&img)).len()))
    });

    c.bench_function("fast_brief_match_self", |b| {
        b.iter(|| {
            black_box(
                backend
                    .match_features(black_box(&features), black_box(&features), 0.75)
                    .matches
                    .len(),
            )
        })
    });
}

fn bench_lock_tick(c: &mut Criterion) {
    let reference = make_texture(320, 240, 8, 5);
    let mut engine = LockEngine::new(FastBriefBackend::default(), LockConfig::default());
    if engine.init(&reference).is_err() {
        return;
    }
    let mut now_ms = 0u64;

    c.bench_function("lock_fresh_attempt_320x240", |b| {
        b.iter(|| {
            now_ms += 1_000;
            black_box(engine.process(black_box(&reference), now_ms))
        })
    });
}

criterion_group!(
    hotpaths,
    bench_four_point,
    bench_ransac,
    bench_fast_brief,
    bench_lock_tick
);
criterion_main!(hotpaths);
