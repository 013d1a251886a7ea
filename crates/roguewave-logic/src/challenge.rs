//! Enemy challenge rating, a rough difficulty score used when building waves.
//!
//! `rating = round((defensive + mobility + offensive) / 2)`

use serde::{Deserialize, Serialize};

/// One weapon carried by an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub damage: f32,
    /// Damage-over-time weapons are scored per tick, not per hit.
    pub damage_over_time: bool,
}

/// Movement figures that feed the mobility score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobilityProfile {
    pub min_speed: f32,
    pub max_speed: f32,
    pub minimum_height: f32,
}

/// The inputs to a challenge rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeInputs {
    pub health_max: Option<f32>,
    pub require_line_of_sight: bool,
    pub view_distance: f32,
    pub return_to_spawner: bool,
    pub seek_distance: f32,
    pub spawns_defensive_units: bool,
    pub optimal_distance: f32,
    /// `None` for stationary enemies.
    pub mobility: Option<MobilityProfile>,
    pub weapons: Vec<WeaponProfile>,
}

pub fn defensive_rating(inputs: &ChallengeInputs) -> f32 {
    let mut rating = inputs.health_max.map_or(0.0, |h| h / 10.0);
    rating += if inputs.require_line_of_sight {
        inputs.view_distance / 10.0
    } else {
        5.0
    };
    rating += if inputs.return_to_spawner {
        inputs.seek_distance / 10.0
    } else {
        15.0
    };
    if inputs.spawns_defensive_units {
        rating += 10.0;
    }
    rating
}

pub fn mobility_rating(inputs: &ChallengeInputs) -> f32 {
    match inputs.mobility {
        Some(m) => {
            m.min_speed / 10.0
                + m.max_speed / 10.0
                + inputs.optimal_distance / 10.0
                + m.minimum_height / 20.0
        }
        None => -20.0,
    }
}

pub fn offensive_rating(inputs: &ChallengeInputs) -> f32 {
    if inputs.weapons.is_empty() {
        return 5.0;
    }
    inputs
        .weapons
        .iter()
        .map(|w| if w.damage_over_time { w.damage } else { w.damage * 10.0 })
        .sum()
}

pub fn challenge_rating(inputs: &ChallengeInputs) -> i32 {
    let total = defensive_rating(inputs) + mobility_rating(inputs) + offensive_rating(inputs);
    (total / 2.0).round() as i32
}

/// Memoised rating. Zero is a valid rating, so "not computed" is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCache(Option<i32>);

impl ChallengeCache {
    pub fn get_or_compute(&mut self, inputs: &ChallengeInputs) -> i32 {
        *self.0.get_or_insert_with(|| challenge_rating(inputs))
    }

    pub fn cached(&self) -> Option<i32> {
        self.0
    }

    pub fn invalidate(&mut self) {
        self.0 = None;
    }
}
