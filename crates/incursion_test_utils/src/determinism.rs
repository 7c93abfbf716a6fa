//! Determinism testing utilities.
//!
//! Provides a harness for verifying that invasions play out identically
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! An invasion must be fully reproducible from its seed. Sources of
//! non-determinism include:
//!
//! - **Floating-point math**: fractions use [`incursion_core::math::Fixed`].
//!
//! - **HashMap iteration order**: the core only iterates `BTreeMap`s and
//!   sorted vectors.
//!
//! - **System randomness**: every roll comes from a seeded
//!   [`incursion_core::rng::RollSource`].
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual components (combat, composition, scheduling)
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: whole services over many days are reproducible
//! 4. **Parallel tests**: services run on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use serde::Serialize;

use incursion_core::scheduler::GameClock;
use incursion_core::service::{FacilityState, InvasionService};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run agreed, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Invasion is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !is_deterministic {
        tracing::warn!(?hashes, steps, "Runs diverged");
    }

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Hash any serializable value through its bincode encoding.
///
/// Returns 0 if the value cannot be encoded.
pub fn compute_state_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = bincode::serialize(value).unwrap_or_default();
    compute_hash(&bytes)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Clock for the `step`-th tick when a day has `minutes_per_day` ticks.
#[must_use]
pub fn clock_at(step: u64, minutes_per_day: u32) -> GameClock {
    let per_day = u64::from(minutes_per_day.max(1));
    GameClock::new((step / per_day) as u32, (step % per_day) as u32)
}

/// Tick `service` from step `from` up to (not including) step `to`.
///
/// A tick the channel rejects is logged and skipped.
pub fn run_service(service: &mut InvasionService, from: u64, to: u64) {
    let minutes = service.tuning().minutes_per_day;
    for step in from..to {
        if let Err(err) = service.tick(clock_at(step, minutes)) {
            tracing::warn!(step, %err, "Tick rejected");
        }
    }
}

/// Hash of the facility snapshot a service currently holds.
#[must_use]
pub fn service_hash(service: &InvasionService) -> u64 {
    compute_state_hash(service.facility())
}

/// Run several services on separate threads and collect their final hashes.
pub fn run_parallel_services<F>(setup_fn: F, num_services: usize, steps: u64) -> Vec<u64>
where
    F: Fn() -> InvasionService + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_services)
            .map(|_| {
                s.spawn(|| {
                    let mut service = setup_fn();
                    run_service(&mut service, 0, steps);
                    service_hash(&service)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    })
}

/// Compare two runs step by step, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(step)` if they differ after that step.
pub fn find_first_divergence<F>(setup_fn: F, steps: u64) -> Option<u64>
where
    F: Fn() -> InvasionService,
{
    let mut a = setup_fn();
    let mut b = setup_fn();
    if service_hash(&a) != service_hash(&b) {
        return Some(0);
    }

    for step in 0..steps {
        run_service(&mut a, step, step + 1);
        run_service(&mut b, step, step + 1);
        if service_hash(&a) != service_hash(&b) {
            return Some(step + 1);
        }
    }
    None
}

/// Verify that a snapshot round-trip preserves the facility exactly.
pub fn verify_snapshot_round_trip(facility: &FacilityState) -> bool {
    let Ok(bytes) = facility.serialize() else {
        return false;
    };
    let Ok(restored) = FacilityState::deserialize(&bytes) else {
        return false;
    };
    compute_state_hash(facility) == compute_state_hash(&restored) && &restored == facility
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;

    use incursion_core::catalog::{BaseStats, InvaderClass};
    use incursion_core::facility::{Connection, FacilityLayout, Room, RoomId, RoomKind, TilePos};

    /// Any invader class.
    pub fn arb_class() -> impl Strategy<Value = InvaderClass> {
        proptest::sample::select(InvaderClass::ALL.to_vec())
    }

    /// A list of classes for party fixtures.
    pub fn arb_classes(max_len: usize) -> impl Strategy<Value = Vec<InvaderClass>> {
        proptest::collection::vec(arb_class(), 1..max_len)
    }

    /// Stats in the range the standard catalog uses.
    pub fn arb_stats() -> impl Strategy<Value = BaseStats> {
        (10i32..60, 1i32..15, 0i32..12, 1i32..10)
            .prop_map(|(hp, attack, defense, speed)| BaseStats::new(hp, attack, defense, speed))
    }

    /// Seeds as short strings.
    pub fn arb_seed() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,12}"
    }

    /// Fear level in `0..=5`.
    pub fn arb_fear_level() -> impl Strategy<Value = i32> {
        0i32..=5
    }

    /// A chain of rooms from an entrance to an altar, with random fear,
    /// traps and connection costs.
    ///
    /// Rooms sit four tiles apart on a single row.
    pub fn arb_chain_layout(max_middle: usize) -> impl Strategy<Value = FacilityLayout> {
        proptest::collection::vec((arb_fear_level(), any::<bool>(), 1u32..8), 0..max_middle).prop_map(
            |middle| {
                let count = middle.len() as u32 + 2;
                let mut rooms = vec![Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 1))];
                for (i, (fear, trap, _)) in middle.iter().enumerate() {
                    let id = i as u32 + 2;
                    let mut room =
                        Room::new(RoomId(id), RoomKind::Corridor, TilePos::new(4 * (id as i32 - 1), 1))
                            .with_fear(*fear);
                    if *trap {
                        room = room.with_trap();
                    }
                    rooms.push(room);
                }
                rooms.push(Room::new(
                    RoomId(count),
                    RoomKind::Altar,
                    TilePos::new(4 * (count as i32 - 1), 1),
                ));

                let mut connections: Vec<Connection> = middle
                    .iter()
                    .enumerate()
                    .map(|(i, (_, _, cost))| Connection::new(RoomId(i as u32 + 1), RoomId(i as u32 + 2), *cost))
                    .collect();
                connections.push(Connection::new(RoomId(count - 1), RoomId(count), 4));

                FacilityLayout {
                    width: 4 * count as i32,
                    height: 3,
                    rooms,
                    connections,
                    altar_room: Some(RoomId(count)),
                    entrance_room: Some(RoomId(1)),
                    defenders: Vec::new(),
                }
            },
        )
    }
}
