//! Tick benchmark — measure the full control pipeline per tick.
//!
//! The tick must finish comfortably inside the 10ms interval; this
//! benchmarks the full orchestration (presence, integration, target
//! resolution, speed mapping, motor apply) against the simulated
//! drivers, plus the hot inner pieces on their own.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use shade_common::hal::RotationSink;
use shade_common::params::{LogWriteback, Params};
use shade_common::telemetry::TelemetrySink;
use shade_control_unit::controller::MotionController;
use shade_control_unit::presence::PresenceDetector;
use shade_control_unit::rotation::RotationAccumulator;
use shade_control_unit::speed::{SpeedProfile, map_speed};
use shade_hal::{SimIndicator, SimPir, SimPlant, SimPlantConfig};

/// Telemetry sink that drops everything, so publishing cost stays out
/// of the measurement.
struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn publish_motion(&mut self, _active: bool) {}
    fn publish_position(&mut self, _position: f64) {}
}

fn controller() -> (MotionController, Arc<RotationAccumulator>) {
    let params = Params {
        automate: true,
        invert_encoder: false,
        ..Params::default()
    };
    let accumulator = Arc::new(RotationAccumulator::new(false));
    let sink: Arc<dyn RotationSink> = accumulator.clone();
    let (_plant, motor) = SimPlant::new(SimPlantConfig::default(), sink);
    let controller = MotionController::new(
        params,
        accumulator.clone(),
        Box::new(motor),
        Box::new(SimPir::new(0)),
        Box::new(SimIndicator::new()),
        Box::new(NullTelemetry),
        Box::new(LogWriteback),
    );
    (controller, accumulator)
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_full");
    group.significance_level(0.01);
    group.sample_size(500);

    group.bench_function("idle", |b| {
        let (mut controller, _acc) = controller();
        let mut now_ms = 0u64;
        b.iter(|| {
            now_ms += 10;
            controller.tick(now_ms);
        });
    });

    group.bench_function("with_rotation", |b| {
        let (mut controller, acc) = controller();
        let mut now_ms = 0u64;
        b.iter(|| {
            now_ms += 10;
            // Typical per-tick delta while driving.
            acc.record(0.02);
            controller.tick(now_ms);
        });
    });

    group.finish();
}

fn bench_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_components");

    group.bench_function("speed_map", |b| {
        let profile = SpeedProfile::from_params(&Params::default());
        let mut error = 0.0f64;
        b.iter(|| {
            error = (error + 1.7) % 40.0 - 20.0;
            std::hint::black_box(map_speed(error, &profile));
        });
    });

    group.bench_function("presence_sample", |b| {
        let mut detector = PresenceDetector::new();
        let mut now_ms = 0u64;
        b.iter(|| {
            now_ms += 10;
            let threshold = PresenceDetector::threshold_for(75.0, 150.0, 300);
            std::hint::black_box(detector.on_sample(310, threshold, now_ms, 2000));
        });
    });

    group.bench_function("accumulator_record_drain", |b| {
        let acc = RotationAccumulator::new(false);
        b.iter(|| {
            acc.record(0.02);
            std::hint::black_box(acc.drain());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick, bench_components);
criterion_main!(benches);
