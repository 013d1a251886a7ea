//! Recipes: templates for everything the nanobots can build or offer.
//!
//! A [`Recipe`] is immutable once loaded. Its category-specific payload is
//! the tagged [`RecipeKind`]; anything that changes during a run lives in a
//! separate [`RecipeRunState`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable identifier, unique across the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(pub String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecipeCategory {
    Health,
    Shield,
    Armour,
    Weapon,
    Ammo,
    AmmoUpgrade,
    Tool,
    Item,
    Passive,
    Stat,
}

impl RecipeCategory {
    pub const ALL: [RecipeCategory; 10] = [
        RecipeCategory::Health,
        RecipeCategory::Shield,
        RecipeCategory::Armour,
        RecipeCategory::Weapon,
        RecipeCategory::Ammo,
        RecipeCategory::AmmoUpgrade,
        RecipeCategory::Tool,
        RecipeCategory::Item,
        RecipeCategory::Passive,
        RecipeCategory::Stat,
    ];

    /// Categories whose build produces a pickup in the world.
    pub fn spawns_pickup(self) -> bool {
        matches!(
            self,
            RecipeCategory::Health
                | RecipeCategory::Shield
                | RecipeCategory::Armour
                | RecipeCategory::Weapon
                | RecipeCategory::Ammo
                | RecipeCategory::Tool
                | RecipeCategory::Item
        )
    }
}

/// Category payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipeKind {
    Health {
        heal_amount: f32,
    },
    Shield {
        amount: f32,
    },
    Armour {
        amount: f32,
    },
    Weapon {
        weapon: String,
        /// Ammo recipe granted alongside the weapon.
        #[serde(default)]
        ammo_recipe: Option<RecipeId>,
    },
    Ammo {
        ammo_type: String,
        quantity: u32,
        max_quantity: u32,
    },
    AmmoUpgrade {
        ammo_type: String,
    },
    Tool {
        tool: String,
    },
    Item {
        item: String,
    },
    Passive {
        max_stack: u32,
    },
    Stat {
        stat: String,
        modifier: f32,
        /// Re-apply the modifier every this many seconds.
        #[serde(default)]
        repeat_every: Option<f32>,
    },
}

impl RecipeKind {
    pub fn category(&self) -> RecipeCategory {
        match self {
            RecipeKind::Health { .. } => RecipeCategory::Health,
            RecipeKind::Shield { .. } => RecipeCategory::Shield,
            RecipeKind::Armour { .. } => RecipeCategory::Armour,
            RecipeKind::Weapon { .. } => RecipeCategory::Weapon,
            RecipeKind::Ammo { .. } => RecipeCategory::Ammo,
            RecipeKind::AmmoUpgrade { .. } => RecipeCategory::AmmoUpgrade,
            RecipeKind::Tool { .. } => RecipeCategory::Tool,
            RecipeKind::Item { .. } => RecipeCategory::Item,
            RecipeKind::Passive { .. } => RecipeCategory::Passive,
            RecipeKind::Stat { .. } => RecipeCategory::Stat,
        }
    }
}

/// Announcement clips. Missing clips fall back to the manager's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeClips {
    pub name: Option<String>,
    pub build_started: Option<String>,
    pub build_complete: Option<String>,
    pub pickup_particles: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub display_name: String,
    #[serde(flatten)]
    pub kind: RecipeKind,
    pub build_cost: u32,
    /// Cost to buy between runs; may differ from the in-run build cost.
    #[serde(default)]
    pub buy_cost: u32,
    #[serde(default)]
    pub time_to_build: f32,
    /// Minimum nanobot level before this recipe can be offered.
    #[serde(default)]
    pub level: u32,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub is_power_up: bool,
    #[serde(default = "default_true")]
    pub available: bool,
    /// Unique recipes are never offered again once owned.
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub clips: RecipeClips,
}

impl Recipe {
    pub fn category(&self) -> RecipeCategory {
        self.kind.category()
    }

    pub fn is_unique(&self) -> bool {
        self.unique || self.category() == RecipeCategory::Weapon
    }

    /// Whether the player would benefit from building this now.
    pub fn should_build(&self, player: &PlayerSnapshot, run: &RecipeRunState) -> bool {
        if self.unique && run.builds > 0 {
            return false;
        }
        match &self.kind {
            RecipeKind::Health { .. } => player.health.missing() > 0.0,
            RecipeKind::Shield { .. } => player.shield.current < player.shield.max || player.shield.max <= 0.0,
            RecipeKind::Armour { .. } => player.armour.current < player.armour.max || player.armour.max <= 0.0,
            RecipeKind::Weapon { weapon, .. } => !player.has_weapon(weapon),
            RecipeKind::Ammo { ammo_type, max_quantity, .. } => {
                player.ammo_of(ammo_type) < *max_quantity
            }
            RecipeKind::Passive { max_stack } => run.applications < *max_stack,
            RecipeKind::AmmoUpgrade { .. }
            | RecipeKind::Tool { .. }
            | RecipeKind::Item { .. }
            | RecipeKind::Stat { .. } => true,
        }
    }

    /// Whether the player already holds at least `fraction` of what this
    /// recipe restores. Categories without a gauge never do.
    pub fn has_amount(&self, player: &PlayerSnapshot, fraction: f32) -> bool {
        match &self.kind {
            RecipeKind::Health { .. } => player.health.at_least(fraction),
            RecipeKind::Shield { .. } => player.shield.at_least(fraction),
            RecipeKind::Armour { .. } => player.armour.at_least(fraction),
            RecipeKind::Ammo { ammo_type, max_quantity, .. } => {
                *max_quantity > 0 && player.ammo_of(ammo_type) as f32 >= *max_quantity as f32 * fraction
            }
            _ => false,
        }
    }

    /// Heal amount as a share of the player's missing health, unclamped.
    /// Zero for non-health recipes or an unhurt player.
    pub fn heal_fraction(&self, player: &PlayerSnapshot) -> f32 {
        match &self.kind {
            RecipeKind::Health { heal_amount } => {
                let missing = player.health.missing();
                if missing > 0.0 {
                    heal_amount / missing
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Whether this recipe may appear in an offer at all.
    pub fn can_offer(&self, owned: &BTreeSet<RecipeId>, run: &RecipeRunState) -> bool {
        if self.is_unique() && owned.contains(&self.id) {
            return false;
        }
        match &self.kind {
            RecipeKind::Passive { max_stack } => run.applications < *max_stack,
            _ => true,
        }
    }
}

/// Per-run mutable state of one recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRunState {
    /// Completed builds this run.
    pub builds: u32,
    /// Times a stat, passive or ammo upgrade has been applied.
    pub applications: u32,
    /// Sum of stat modifiers applied so far.
    pub accumulated_modifier: f32,
}

impl RecipeRunState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}

/// A current/max pair such as health or shield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    pub current: f32,
    pub max: f32,
}

impl Gauge {
    pub fn new(current: f32, max: f32) -> Self {
        Self { current, max }
    }

    pub fn full(max: f32) -> Self {
        Self::new(max, max)
    }

    pub fn missing(&self) -> f32 {
        (self.max - self.current).max(0.0)
    }

    /// A gauge with no capacity never counts as holding any amount.
    pub fn at_least(&self, fraction: f32) -> bool {
        self.max > 0.0 && self.current >= self.max * fraction
    }
}

/// A weapon in the player's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedWeapon {
    pub weapon: String,
    pub ammo_type: Option<String>,
}

/// Read-only view of the player used by recipe predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub health: Gauge,
    pub shield: Gauge,
    pub armour: Gauge,
    pub weapons: Vec<OwnedWeapon>,
    /// Index into `weapons` of the wielded weapon.
    pub selected_weapon: Option<usize>,
    /// Rounds held per ammo type.
    pub ammo: BTreeMap<String, u32>,
}

impl PlayerSnapshot {
    pub fn has_weapon(&self, weapon: &str) -> bool {
        self.weapons.iter().any(|w| w.weapon == weapon)
    }

    pub fn ammo_of(&self, ammo_type: &str) -> u32 {
        self.ammo.get(ammo_type).copied().unwrap_or(0)
    }

    pub fn selected(&self) -> Option<&OwnedWeapon> {
        self.selected_weapon.and_then(|i| self.weapons.get(i))
    }
}
