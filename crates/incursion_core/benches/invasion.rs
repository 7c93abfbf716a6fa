//! Invasion benchmarks for incursion_core.
//!
//! Run with: `cargo bench -p incursion_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use incursion_core::battle::Battle;
use incursion_core::catalog::InvaderClass;
use incursion_core::tuning::InvasionTuning;
use incursion_test_utils::determinism::run_service;
use incursion_test_utils::fixtures::{party, sample_invasion, sample_layout, sample_service};

/// Full battle on the sample dungeon, and sixty days of a ticking service.
pub fn invasion_benchmark(c: &mut Criterion) {
    let layout = sample_layout();
    let tuning = InvasionTuning::default();
    let invasion = sample_invasion(
        party(&[
            InvaderClass::Warrior,
            InvaderClass::Rogue,
            InvaderClass::Mage,
            InvaderClass::Cleric,
            InvaderClass::Ranger,
        ]),
        "bench",
    );

    c.bench_function("battle_to_completion", |b| {
        b.iter(|| {
            let mut battle = Battle::start(black_box(invasion.clone()), &layout, &tuning, "bench");
            black_box(battle.run_to_completion())
        });
    });

    c.bench_function("service_sixty_days", |b| {
        b.iter(|| {
            let mut service = sample_service("bench");
            run_service(&mut service, 0, 60 * 24);
            black_box(service.facility().invasions_started)
        });
    });
}

criterion_group!(benches, invasion_benchmark);
criterion_main!(benches);
