//! Tick loop benchmarks
//!
//! Run with: cargo bench --bench tick

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pitch_match::game::input::{ControllerFrame, ControllerId, ControllerInputs};
use pitch_match::game::{tick, MatchPhase, MatchSetup, MatchState, PlayerHandle, TeamId};
use pitch_match::{FixedVec3, MatchConfig};
use rand::Rng;

/// Running match with `controllers` players on pads and the ball scattered.
fn running_match(controllers: u8) -> (MatchState, MatchConfig) {
    let config = MatchConfig::default();
    let mut setup = MatchSetup::standard(*uuid::Uuid::new_v4().as_bytes(), 7);
    setup.controllers = (0..controllers)
        .map(|c| {
            let team = if c % 2 == 0 { TeamId::First } else { TeamId::Second };
            (ControllerId(c), PlayerHandle::new(team, u16::from(c / 2) % 11))
        })
        .collect();

    let mut state = MatchState::new(&setup, &config).expect("standard setup is valid");
    state.set_phase(MatchPhase::FirstHalf).expect("forward phase change");
    state.start_play();

    let mut rng = rand::thread_rng();
    state.registry.ball.velocity =
        FixedVec3::new(rng.gen_range(-20..20) << 16, rng.gen_range(-20..20) << 16, rng.gen_range(0..5) << 16);
    (state, config)
}

fn random_inputs(controllers: u8) -> ControllerInputs {
    let mut rng = rand::thread_rng();
    (0..controllers)
        .map(|c| {
            let mut frame = ControllerFrame::with_movement(rng.gen_range(-127..=127), rng.gen_range(-127..=127));
            frame.set_kick(rng.gen_bool(0.05));
            frame.set_sprint(rng.gen_bool(0.3));
            (ControllerId(c), frame)
        })
        .collect()
}

/// Single tick at various controller counts
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(50);

    for controllers in [0u8, 2, 8, 22] {
        let (mut state, config) = running_match(controllers);
        let inputs = random_inputs(controllers);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("controllers", controllers), &controllers, |b, _| {
            b.iter(|| black_box(tick(&mut state, &inputs, &config)));
        });
    }

    group.finish();
}

/// One simulated minute, including mental image commits
fn bench_minute(c: &mut Criterion) {
    let mut group = c.benchmark_group("minute");
    group.sample_size(10);

    group.bench_function("6000_ticks", |b| {
        b.iter(|| {
            let (mut state, config) = running_match(2);
            let inputs = random_inputs(2);
            for _ in 0..6000 {
                tick(&mut state, &inputs, &config);
            }
            black_box(state.compute_hash())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick, bench_minute);
criterion_main!(benches);
