//! Goal-point selection for enemies.
//!
//! Both attack and wander destinations come from one rejection-sampling
//! policy: draw up to [`DESTINATION_SEARCH_TRIES`] candidates, accept the
//! first that is inside the map and clear in all four horizontal
//! directions, and otherwise return the caller's fallback.

use crate::geometry::{random_on_unit_sphere, Vec3};
use crate::spatial::{LayerMask, SpatialQuery};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Candidates drawn before a search gives up.
pub const DESTINATION_SEARCH_TRIES: u32 = 50;
/// Attack positions need this fraction of the optimal distance clear around them.
pub const ATTACK_CLEARANCE_FACTOR: f32 = 0.9;
/// Clearance radius for wander positions.
pub const WANDER_CLEARANCE: f32 = 1.0;

/// Horizontal extent enemies may pick destinations in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl MapBounds {
    /// Bounds of a level built from `map_size` lots of `lot_size` each,
    /// leaving the outer ring of lots out.
    pub fn from_level(lot_size: (f32, f32), map_size: (u32, u32)) -> Self {
        Self {
            min_x: lot_size.0,
            min_z: lot_size.1,
            max_x: (map_size.0 as f32 - 1.0) * lot_size.0,
            max_z: (map_size.1 as f32 - 1.0) * lot_size.1,
        }
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.z >= self.min_z && point.z <= self.max_z
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new((self.min_x + self.max_x) * 0.5, 0.0, (self.min_z + self.max_z) * 0.5)
    }
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// A validated candidate, found on the given try.
    Found { point: Vec3, tries: u32 },
    /// Every try failed; the caller's fallback is returned.
    Fallback(Vec3),
}

impl SearchOutcome {
    pub fn point(&self) -> Vec3 {
        match self {
            SearchOutcome::Found { point, .. } => *point,
            SearchOutcome::Fallback(point) => *point,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SearchOutcome::Fallback(_))
    }
}

/// Inside `bounds` with nothing within `clearance` along ±x and ±z.
pub fn is_clear(
    point: Vec3,
    clearance: f32,
    bounds: &MapBounds,
    world: &dyn SpatialQuery,
    mask: LayerMask,
) -> bool {
    if !point.is_finite() || !bounds.contains(&point) {
        return false;
    }
    [Vec3::FORWARD, Vec3::BACK, Vec3::LEFT, Vec3::RIGHT]
        .into_iter()
        .all(|dir| world.ray_cast(point, dir, clearance, mask).is_none())
}

/// The shared rejection-sampling policy.
pub fn search<R: Rng>(
    rng: &mut R,
    mut candidate: impl FnMut(&mut R) -> Vec3,
    mut accept: impl FnMut(Vec3) -> bool,
    fallback: Vec3,
) -> SearchOutcome {
    for tries in 1..=DESTINATION_SEARCH_TRIES {
        let point = candidate(rng);
        if accept(point) {
            return SearchOutcome::Found { point, tries };
        }
    }
    SearchOutcome::Fallback(fallback)
}

/// A point roughly `optimal_distance` from `target`, falling back to the
/// target itself.
pub fn attack_position(
    target: Vec3,
    optimal_distance: f32,
    bounds: &MapBounds,
    world: &dyn SpatialQuery,
    mask: LayerMask,
    rng: &mut impl Rng,
) -> SearchOutcome {
    let clearance = optimal_distance * ATTACK_CLEARANCE_FACTOR;
    search(
        rng,
        |rng| target + random_on_unit_sphere(rng) * optimal_distance,
        |point| is_clear(point, clearance, bounds, world, mask),
        target,
    )
}

/// A uniformly random point in the map and height band, falling back to
/// `spawn`.
pub fn wander_position(
    bounds: &MapBounds,
    height: (f32, f32),
    spawn: Vec3,
    world: &dyn SpatialQuery,
    mask: LayerMask,
    rng: &mut impl Rng,
) -> SearchOutcome {
    let (lo, hi) = (height.0.min(height.1), height.0.max(height.1));
    let outcome = search(
        rng,
        |rng| {
            Vec3::new(
                sample(rng, bounds.min_x, bounds.max_x),
                sample(rng, lo, hi),
                sample(rng, bounds.min_z, bounds.max_z),
            )
        },
        |point| is_clear(point, WANDER_CLEARANCE, bounds, world, mask),
        spawn,
    );
    if outcome.is_fallback() {
        log::warn!("unable to find a wander destination, returning to spawn position");
    }
    outcome
}

fn sample(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}
