//! Process-wide game context: stats, recipe catalog, profile and run data.
//!
//! Built once at startup and handed to every consumer by reference.

use roguewave_logic::catalog::RecipeCatalog;
use roguewave_logic::recipe::RecipeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const ENEMIES_SPAWNED: &str = "ENEMIES_SPAWNED";
pub const ENEMY_KILLS: &str = "ENEMY_KILLS";
pub const RESOURCES_COLLECTED: &str = "RESOURCES_COLLECTED";
pub const RECIPES_CALLED_IN: &str = "RECIPES_CALLED_IN";
pub const MAX_NANOBOT_LEVEL: &str = "MAX_NANOBOT_LEVEL";
pub const SPAWNERS_DESTROYED: &str = "SPAWNERS_DESTROYED";

/// Append-only named counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    values: BTreeMap<String, i64>,
    #[serde(skip)]
    dirty: bool,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: &str, amount: i64) {
        *self.values.entry(key.to_owned()).or_insert(0) += amount;
        self.dirty = true;
    }

    pub fn value(&self, key: &str) -> i64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Raise `key` to `value` if it is currently lower.
    pub fn raise_to(&mut self, key: &str, value: i64) {
        let current = self.value(key);
        if value > current {
            self.add(key, value - current);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, i64)> for GameStats {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            dirty: false,
        }
    }
}

/// Progression that survives between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileData {
    pub nanobot_level: u32,
    /// Recipes owned permanently
    pub recipe_ids: BTreeSet<RecipeId>,
    /// Weapons to rebuild at the start of every run, in order
    pub weapon_build_order: Vec<RecipeId>,
    /// Banked resources
    pub resources: u32,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            nanobot_level: 1,
            recipe_ids: BTreeSet::new(),
            weapon_build_order: Vec::new(),
            resources: 0,
        }
    }
}

/// Recipes picked up during the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    /// Acquisition order, duplicates included
    pub acquired: Vec<RecipeId>,
    pub counts: BTreeMap<RecipeId, u32>,
}

impl RunData {
    pub fn add(&mut self, id: RecipeId) {
        *self.counts.entry(id.clone()).or_insert(0) += 1;
        self.acquired.push(id);
    }

    pub fn count(&self, id: &RecipeId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.acquired.clear();
        self.counts.clear();
    }
}

/// Simulation clock: logical frame counter plus elapsed seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub frame: u64,
    pub time: f32,
}

impl Clock {
    pub fn advance(&mut self, dt: f32) {
        self.frame += 1;
        self.time += dt.max(0.0);
    }
}

pub struct GameContext {
    pub stats: GameStats,
    pub catalog: RecipeCatalog,
    pub profile: ProfileData,
    pub run: RunData,
    pub clock: Clock,
}

impl GameContext {
    pub fn new(catalog: RecipeCatalog, profile: ProfileData, stats: GameStats) -> Self {
        Self {
            stats,
            catalog,
            profile,
            run: RunData::default(),
            clock: Clock::default(),
        }
    }

    /// Owned permanently or acquired this run.
    pub fn owned_recipes(&self) -> BTreeSet<RecipeId> {
        let mut owned = self.profile.recipe_ids.clone();
        owned.extend(self.run.acquired.iter().cloned());
        owned
    }

    pub fn now(&self) -> f32 {
        self.clock.time
    }
}
