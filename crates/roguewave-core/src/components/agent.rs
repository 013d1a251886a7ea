//! Enemy agent components: authored profile, brain, senses and health.

use hecs::Entity;
use roguewave_logic::challenge::{ChallengeInputs, MobilityProfile, WeaponProfile};
use roguewave_logic::geometry::Vec3;
use roguewave_logic::sight::SightConfig;
use roguewave_logic::steering::SteeringConfig;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Role an enemy plays in a squad. Fixed at spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SquadRole {
    /// Solo, takes no part in coordination
    None,
    /// Follower that defers to its leader's sight
    #[default]
    Fodder,
    Leader,
}

/// Audio an agent makes while the player is near.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwarenessAudio {
    None,
    #[default]
    Bark,
    Drone,
}

/// Seek behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    /// Head home instead of wandering when the target is beyond seek distance
    pub return_to_spawner: bool,
    pub seek_distance: f32,
    /// How close to the target the agent tries to get
    pub optimal_distance: f32,
    /// Seconds between voluntary destination changes
    pub destination_update_frequency: f32,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            return_to_spawner: false,
            seek_distance: 30.0,
            optimal_distance: 0.2,
            destination_update_frequency: 2.0,
        }
    }
}

/// Reinforcements spawned when a single hit does enough damage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefensiveSpawnConfig {
    pub threshold: f32,
    pub count: u32,
    pub distance: f32,
    /// Spawn around the attacker rather than around this agent
    pub around_attacker: bool,
    /// Enemy prototype names, one is picked at random per unit
    pub prototypes: Vec<String>,
}

impl Default for DefensiveSpawnConfig {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            count: 3,
            distance: 10.0,
            around_attacker: false,
            prototypes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplosionConfig {
    pub radius: f32,
    pub damage: f32,
    pub force: f32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self { radius: 5.0, damage: 20.0, force: 15.0 }
    }
}

/// Loot and effects on death.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathConfig {
    /// Chance in [0, 1] of dropping a resource pickup
    pub drop_chance: f32,
    pub resources: u32,
    pub explosion: Option<ExplosionConfig>,
    /// Offset of the death effect from the agent's position
    pub effect_offset: Vec3,
    pub clips: Vec<String>,
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            drop_chance: 0.5,
            resources: 10,
            explosion: None,
            effect_offset: Vec3::UP,
            clips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub awareness: AwarenessAudio,
    /// Awareness audio only plays within this distance of the target
    pub max_audio_distance: f32,
    pub bark_clips: Vec<String>,
    /// Seconds between barks, drawn uniformly from this range
    pub bark_frequency: (f32, f32),
    pub drone_clip: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            awareness: AwarenessAudio::Bark,
            max_audio_distance: 30.0,
            bark_clips: Vec::new(),
            bark_frequency: (5.0, 10.0),
            drone_clip: None,
        }
    }
}

/// Everything authored about one kind of enemy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    /// Prototype key used by waves and the entity pool
    pub name: String,
    pub display_name: String,
    pub available_to_waves: bool,
    pub squad_role: SquadRole,
    pub health_max: Option<f32>,
    /// Stationary enemies have no steering
    pub mobile: bool,
    pub steering: SteeringConfig,
    pub sight: SightConfig,
    pub seek: SeekConfig,
    pub defensive: Option<DefensiveSpawnConfig>,
    pub death: DeathConfig,
    pub audio: AudioConfig,
    pub weapons: Vec<WeaponProfile>,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self {
            name: "enemy".into(),
            display_name: "TBD".into(),
            available_to_waves: true,
            squad_role: SquadRole::Fodder,
            health_max: Some(100.0),
            mobile: true,
            steering: SteeringConfig::default(),
            sight: SightConfig::default(),
            seek: SeekConfig::default(),
            defensive: None,
            death: DeathConfig::default(),
            audio: AudioConfig::default(),
            weapons: Vec::new(),
        }
    }
}

impl EnemyProfile {
    pub fn challenge_inputs(&self) -> ChallengeInputs {
        ChallengeInputs {
            health_max: self.health_max,
            require_line_of_sight: self.sight.require_line_of_sight,
            view_distance: self.sight.view_distance,
            return_to_spawner: self.seek.return_to_spawner,
            seek_distance: self.seek.seek_distance,
            spawns_defensive_units: self.defensive.is_some(),
            optimal_distance: self.seek.optimal_distance,
            mobility: self.mobile.then_some(MobilityProfile {
                min_speed: self.steering.min_speed,
                max_speed: self.steering.max_speed,
                minimum_height: self.steering.minimum_height,
            }),
            weapons: self.weapons.clone(),
        }
    }
}

/// Shared handle to an agent's authored profile
#[derive(Debug, Clone)]
pub struct Profile(pub Arc<EnemyProfile>);

impl Deref for Profile {
    type Target = EnemyProfile;

    fn deref(&self) -> &EnemyProfile {
        &self.0
    }
}

/// Movement state, as classified after each destination update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Wander,
    Seeking,
    Attacking,
    Recharging,
    UnderOrders,
}

/// Destination decision state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brain {
    pub state: AgentState,
    pub goal: Option<Vec3>,
    pub spawn_position: Vec3,
    /// Set by a direct attack order, cleared on arrival
    pub under_orders: bool,
    /// Returning to spawn; suppresses every other decision until arrival
    pub recharging: bool,
    pub next_destination_change: f32,
    pub speed_multiplier: f32,
}

impl Brain {
    pub fn new(spawn_position: Vec3) -> Self {
        Self {
            state: AgentState::Wander,
            goal: None,
            spawn_position,
            under_orders: false,
            recharging: false,
            next_destination_change: 0.0,
            speed_multiplier: 1.0,
        }
    }
}

/// Cached distance to the target, refreshed at a random sub-second interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetRange {
    pub distance: f32,
    pub next_check: f32,
}

impl Default for TargetRange {
    fn default() -> Self {
        Self { distance: f32::INFINITY, next_check: 0.0 }
    }
}

/// What the agent and its squad could see this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perception {
    pub can_see: bool,
    pub squad_can_see: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub speed: f32,
    pub arrived: bool,
}

/// Health pool. `alive` is false for dead and dormant agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub alive: bool,
}

/// Result of applying damage to a [`Health`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    pub old: f32,
    pub new: f32,
    pub died: bool,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max, alive: true }
    }

    pub fn restore(&mut self) {
        self.current = self.max;
        self.alive = true;
    }

    /// Apply `amount` damage. Dead health pools don't change.
    pub fn damage(&mut self, amount: f32) -> HealthChange {
        let old = self.current;
        if !self.alive {
            return HealthChange { old, new: old, died: false };
        }
        self.current = (self.current - amount.max(0.0)).max(0.0);
        let died = self.current <= 0.0;
        if died {
            self.alive = false;
        }
        HealthChange { old, new: self.current, died }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Awareness {
    pub next_bark: f32,
    pub drone_playing: bool,
}

/// Identifier of a squad in the [`crate::systems::SquadRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquadId(pub u32);

/// How an agent relates to a squad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquadMembership {
    #[default]
    Solo,
    Leads(SquadId),
    Follows(SquadId),
}

impl SquadMembership {
    pub fn role(&self) -> SquadRole {
        match self {
            SquadMembership::Solo => SquadRole::None,
            SquadMembership::Leads(_) => SquadRole::Leader,
            SquadMembership::Follows(_) => SquadRole::Fodder,
        }
    }

    pub fn squad(&self) -> Option<SquadId> {
        match self {
            SquadMembership::Solo => None,
            SquadMembership::Leads(id) | SquadMembership::Follows(id) => Some(*id),
        }
    }
}

/// Agent managed by the entity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pooled {
    pub prototype: String,
}

/// Dormant pooled agent waiting for reuse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dormant;

/// Spawner that created this agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedBy(pub Entity);
