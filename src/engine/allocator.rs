//! Top-two Thompson traffic allocation.
//!
//! Each sampling trial casts one unit of mass. Ungated trials give it all
//! to the primary winner; gated trials whose challenger differs split it
//! half and half, which keeps a credible runner-up in play instead of
//! starving it. The exploration floor is then applied as
//! `floor + (1 − explore_floor) · raw`, which guarantees every active arm
//! at least `explore_floor / n_active` while the total stays exactly 1.
//! Paused arms are out of the support and receive 0.

use std::collections::BTreeMap;

use crate::engine::sampler::PosteriorDraws;

/// Allocation for the next traffic window.
pub fn allocate(
    variants: &[String],
    active: &[usize],
    draws: &PosteriorDraws,
    explore_floor: f64,
) -> BTreeMap<String, f64> {
    let mut tally = vec![0.0f64; variants.len()];
    let mut mass = 0.0f64;
    for (primary, challenger, gated) in draws.allocation_trials() {
        if gated && challenger != primary {
            tally[primary] += 0.5;
            tally[challenger] += 0.5;
        } else {
            tally[primary] += 1.0;
        }
        mass += 1.0;
    }

    let floor = explore_floor / active.len() as f64;
    let mut allocation = BTreeMap::new();
    for (v, key) in variants.iter().enumerate() {
        allocation.insert(key.clone(), 0.0);
        if active.contains(&v) {
            let raw = if mass > 0.0 { tally[v] / mass } else { 1.0 / active.len() as f64 };
            allocation.insert(key.clone(), floor + (1.0 - explore_floor) * raw);
        }
    }
    allocation
}

/// Uniform allocation over active arms, used when no exposures exist yet.
pub fn uniform(variants: &[String], active: &[usize]) -> BTreeMap<String, f64> {
    let share = 1.0 / active.len() as f64;
    variants
        .iter()
        .enumerate()
        .map(|(v, key)| {
            let weight = if active.contains(&v) { share } else { 0.0 };
            (key.clone(), weight)
        })
        .collect()
}
