//! Hot-path benchmarks: limit debouncing and the motion unit conversions.

use criterion::{Criterion, criterion_group, criterion_main};
use slider_common::io::DiLogic;
use slider_common::motion::{
    servo_degree_delay, steps_from_distance, steps_per_second_from_percent,
};
use slider_motion::limit::Debouncer;
use std::hint::black_box;
use std::time::{Duration, Instant};

/// One limit poll: polarity decode plus debounce, over a chattering input.
fn bench_debounce_poll(c: &mut Criterion) {
    let start = Instant::now();
    // 1 kHz samples, contact chatters every 3 ms
    let samples: Vec<(bool, Instant)> = (0..1_000u64)
        .map(|i| ((i / 3) % 2 == 0, start + Duration::from_millis(i)))
        .collect();

    c.bench_function("debounce_1000_samples", |b| {
        b.iter(|| {
            let mut debouncer = Debouncer::new(Duration::from_millis(50));
            let mut edges = 0u32;
            for &(level, now) in &samples {
                let active = DiLogic::NC.is_active(black_box(level));
                if debouncer.update(active, now).is_some() {
                    edges += 1;
                }
            }
            black_box(edges)
        });
    });
}

/// Per-command conversions done by the gateway and the sequencer.
fn bench_conversions(c: &mut Criterion) {
    c.bench_function("steps_from_distance", |b| {
        b.iter(|| steps_from_distance(black_box(123.4), black_box(8.0), black_box(200)));
    });

    c.bench_function("percent_to_speed_sweep", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for percent in -10..=110 {
                sum += u64::from(steps_per_second_from_percent(black_box(percent), 100, 2000));
            }
            black_box(sum)
        });
    });

    c.bench_function("servo_degree_delay", |b| {
        b.iter(|| servo_degree_delay(black_box(37)));
    });
}

criterion_group!(benches, bench_debounce_poll, bench_conversions);
criterion_main!(benches);
