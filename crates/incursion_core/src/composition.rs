//! Party composition: which invaders come, shaped by the facility profile.
//!
//! Steps, all drawing from one seeded stream:
//! 1. Roll a party size inside the bracket for the facility size.
//! 2. Force a warrior in first, if the catalog has one.
//! 3. Fill the rest by weighted class selection (capped classes excluded),
//!    then a uniform pick within the class.
//! 4. For balanced profiles, swap duplicates for missing classes until
//!    at least three classes are present.

use std::collections::BTreeMap;

use crate::catalog::{
    Catalog, ClassWeights, CompositionWeights, InvaderClass, InvaderDefinition,
};
use crate::error::{InvasionError, Result};
use crate::invader::{InvaderId, InvaderInstance};
use crate::profile::DungeonProfile;
use crate::rng::{InvasionRng, RollSource};

/// Profile dimensions above this value pull in their weight table.
pub const HIGH_PROFILE_THRESHOLD: i32 = 60;

/// Distinct classes a balanced party should field.
pub const BALANCED_MIN_CLASSES: usize = 3;

/// Label of the composition sub-stream.
const COMPOSITION_STREAM: &str = "composition";

/// Blend the weight tables selected by the profile.
#[must_use]
pub fn blended_weights(
    profile: &DungeonProfile,
    weights: &CompositionWeights,
    threshold: i32,
) -> ClassWeights {
    let emphasis = profile.emphasis(threshold);
    if emphasis.is_balanced() {
        return weights.balanced.clone();
    }
    let mut tables = Vec::with_capacity(3);
    if emphasis.corruption {
        tables.push(&weights.high_corruption);
    }
    if emphasis.wealth {
        tables.push(&weights.high_wealth);
    }
    if emphasis.knowledge {
        tables.push(&weights.high_knowledge);
    }
    ClassWeights::blend(tables)
}

/// Choose a party for `profile` from `definitions`, seeded by `seed`.
///
/// Same seed, same inputs, same party.
#[must_use]
pub fn select_party_composition(
    profile: &DungeonProfile,
    definitions: &[InvaderDefinition],
    weights: &CompositionWeights,
    seed: &str,
) -> Vec<InvaderDefinition> {
    let mut rng = InvasionRng::derive(seed, COMPOSITION_STREAM);
    compose_party(profile, definitions, weights, HIGH_PROFILE_THRESHOLD, &mut rng)
}

/// Party selection against an injected roll source.
pub fn compose_party(
    profile: &DungeonProfile,
    definitions: &[InvaderDefinition],
    weights: &CompositionWeights,
    threshold: i32,
    rng: &mut impl RollSource,
) -> Vec<InvaderDefinition> {
    if definitions.is_empty() {
        return Vec::new();
    }

    let mut by_class: BTreeMap<InvaderClass, Vec<&InvaderDefinition>> = BTreeMap::new();
    for definition in definitions {
        by_class.entry(definition.class).or_default().push(definition);
    }

    let (min_size, max_size) = profile.party_size_bracket();
    let party_size = rng.range_inclusive(min_size as i32, max_size as i32) as usize;
    let max_per_class = party_size / 2;
    let table = blended_weights(profile, weights, threshold);

    let mut party: Vec<InvaderDefinition> = Vec::with_capacity(party_size);
    let mut counts: BTreeMap<InvaderClass, usize> = BTreeMap::new();

    if let Some(warriors) = by_class.get(&InvaderClass::Warrior) {
        party.push(warriors[rng.pick_index(warriors.len())].clone());
        counts.insert(InvaderClass::Warrior, 1);
    }

    while party.len() < party_size {
        let class = pick_class(&by_class, &counts, &table, max_per_class, rng);
        let pool = &by_class[&class];
        party.push(pool[rng.pick_index(pool.len())].clone());
        *counts.entry(class).or_insert(0) += 1;
    }

    if profile.emphasis(threshold).is_balanced() {
        repair_diversity(&mut party, &by_class, rng);
    }

    tracing::debug!(
        party_size,
        max_per_class,
        classes = ?party.iter().map(|d| d.class).collect::<Vec<_>>(),
        "Party composed"
    );
    party
}

/// Weighted pick among uncapped classes; uniform over every class when
/// all are capped or none carries weight.
fn pick_class(
    by_class: &BTreeMap<InvaderClass, Vec<&InvaderDefinition>>,
    counts: &BTreeMap<InvaderClass, usize>,
    table: &ClassWeights,
    max_per_class: usize,
    rng: &mut impl RollSource,
) -> InvaderClass {
    let open: Vec<(InvaderClass, u32)> = by_class
        .keys()
        .filter(|class| counts.get(*class).copied().unwrap_or(0) < max_per_class)
        .map(|&class| (class, table.weight(class)))
        .collect();
    let total = open.iter().fold(0u32, |sum, (_, w)| sum.saturating_add(*w));

    if total == 0 {
        let candidates: Vec<InvaderClass> = if open.is_empty() {
            by_class.keys().copied().collect()
        } else {
            open.iter().map(|(class, _)| *class).collect()
        };
        return candidates[rng.pick_index(candidates.len())];
    }

    // Rolls are i32; oversized tables are clamped rather than wrapped.
    let span = i32::try_from(total).unwrap_or(i32::MAX);
    let mut target = rng.range_inclusive(0, span - 1) as u32;
    for (class, weight) in &open {
        if target < *weight {
            return *class;
        }
        target -= weight;
    }
    // Unreachable with a positive total; keep the last open class.
    open[open.len() - 1].0
}

/// Swap the most common duplicate for a missing class until the party
/// fields enough distinct classes or no swap is possible.
fn repair_diversity(
    party: &mut [InvaderDefinition],
    by_class: &BTreeMap<InvaderClass, Vec<&InvaderDefinition>>,
    rng: &mut impl RollSource,
) {
    loop {
        let mut counts: BTreeMap<InvaderClass, usize> = BTreeMap::new();
        for member in party.iter() {
            *counts.entry(member.class).or_insert(0) += 1;
        }
        if counts.len() >= BALANCED_MIN_CLASSES.min(party.len()) {
            return;
        }
        let Some(missing) = by_class.keys().find(|c| !counts.contains_key(*c)).copied() else {
            return;
        };
        let Some((duplicate, _)) = counts
            .iter()
            .filter(|(_, n)| **n > 1)
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        else {
            return;
        };
        let duplicate = *duplicate;
        let Some(slot) = party.iter().rposition(|m| m.class == duplicate) else {
            return;
        };
        let pool = &by_class[&missing];
        party[slot] = pool[rng.pick_index(pool.len())].clone();
    }
}

/// Confirm the catalog can produce a party at all.
pub fn check_composable(catalog: &Catalog) -> Result<&CompositionWeights> {
    if catalog.invaders.is_empty() {
        return Err(InvasionError::EmptyCatalog);
    }
    catalog
        .composition_weights
        .as_ref()
        .ok_or(InvasionError::MissingCompositionWeights)
}

/// Compose and instantiate a party for one invasion.
///
/// An empty result means "no invasion this cycle": the catalog has no
/// definitions or no weight configuration.
#[must_use]
pub fn generate_invasion_party(
    profile: &DungeonProfile,
    catalog: &Catalog,
    threshold: i32,
    seed: &str,
    invasion_id: &str,
) -> Vec<InvaderInstance> {
    let weights = match check_composable(catalog) {
        Ok(weights) => weights,
        Err(err) => {
            tracing::warn!(invasion_id, %err, "Cannot compose invasion party");
            return Vec::new();
        }
    };
    let mut rng = InvasionRng::derive(seed, COMPOSITION_STREAM);
    compose_party(profile, &catalog.invaders, weights, threshold, &mut rng)
        .iter()
        .enumerate()
        .map(|(i, def)| InvaderInstance::from_definition(InvaderId(i as u32 + 1), def))
        .collect()
}
