//! Benchmarks for per-frame continuity processing and full sessions

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::hint::black_box;
use track_continuity::continuity::TrackedDetection;
use track_continuity::{
    suppress_duplicates, Bbox, ContinuityConfig, Detection, SessionConfig, SessionStores, SmoothingMethod,
    TrackContinuityManager, TrackingSession,
};

/// Players walking across a 1920x1080 pitch with jitter, occasional occlusion
/// gaps and id switches
fn generate_frames(n_tracks: usize, n_frames: usize) -> Vec<Vec<Detection>> {
    let mut rng = rand::thread_rng();
    let starts: Vec<(f32, f32, f32, f32)> = (0..n_tracks)
        .map(|_| {
            (
                rng.gen_range(0.0..1700.0),
                rng.gen_range(0.0..900.0),
                rng.gen_range(-4.0..4.0),
                rng.gen_range(-2.0..2.0),
            )
        })
        .collect();

    (0..n_frames)
        .map(|frame| {
            starts
                .iter()
                .enumerate()
                .filter(|(i, _)| (frame + i * 7) % 40 >= 4) // short occlusions
                .map(|(i, (x, y, vx, vy))| {
                    let epoch = ((frame + i * 7) / 40) as u32;
                    let track_id = i as u32 + epoch * n_tracks as u32;
                    let x = x + vx * frame as f32 + rng.gen_range(-2.0..2.0);
                    let y = y + vy * frame as f32 + rng.gen_range(-2.0..2.0);
                    Detection::new(track_id, Bbox::from_xywh(x, y, 40.0, 90.0), rng.gen_range(0.4..0.95))
                })
                .collect()
        })
        .collect()
}

fn bench_continuity_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuity_process_frame");

    for &n_tracks in [10usize, 22, 50].iter() {
        let frames = generate_frames(n_tracks, 100);
        let n_detections: usize = frames.iter().map(|f| f.len()).sum();
        group.throughput(Throughput::Elements(n_detections as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n_tracks), &frames, |b, frames| {
            b.iter_batched(
                || TrackContinuityManager::new(ContinuityConfig::default()),
                |mut manager| {
                    for (i, detections) in frames.iter().enumerate() {
                        black_box(manager.process_frame(i as u64, black_box(detections)));
                    }
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_suppress_duplicates(c: &mut Criterion) {
    let config = ContinuityConfig::default();
    let detections: Vec<TrackedDetection> = generate_frames(50, 1)
        .remove(0)
        .into_iter()
        .map(|d| TrackedDetection {
            track_id: d.track_id,
            observations: d.track_id as usize % 5 + 1,
            detection: d,
        })
        .collect();

    c.bench_function("suppress_duplicates_50", |b| {
        b.iter(|| suppress_duplicates(black_box(&detections), &config))
    });
}

fn bench_session(c: &mut Criterion) {
    let frames = generate_frames(22, 250);
    let mut group = c.benchmark_group("session_250_frames");

    for method in [SmoothingMethod::None, SmoothingMethod::Ema, SmoothingMethod::Kalman] {
        group.bench_with_input(BenchmarkId::from_parameter(method), &frames, |b, frames| {
            b.iter(|| {
                let mut config = SessionConfig::new(25.0, 2.0, 150.0, 20);
                config.smoothing = method;
                config.gsi = None;
                let mut session = TrackingSession::open(config, SessionStores::default()).unwrap();
                for (i, detections) in frames.iter().enumerate() {
                    black_box(session.process_frame(i as u64, detections));
                }
                session.close()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_continuity_frames,
    bench_suppress_duplicates,
    bench_session
);
criterion_main!(benches);
