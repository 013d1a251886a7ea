//! Fire-and-forget events for the host: audio, effects, pickups and
//! progression notices. The core never waits on any of them.

use crate::systems::NanobotStatus;
use hecs::Entity;
use roguewave_logic::geometry::Vec3;
use roguewave_logic::recipe::RecipeId;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EnemySpawned { entity: Entity, prototype: String },
    EnemyDied { entity: Entity, position: Vec3, challenge_rating: i32 },
    /// Resource pickup placed at ground level
    ResourcesDropped { position: Vec3, amount: u32 },
    DeathEffect { position: Vec3 },
    DeathExplosion { position: Vec3, radius: f32, damage: f32, force: f32 },
    DefensiveUnitsSpawned { source: Entity, units: Vec<Entity> },
    WaveStarted { spawner: Entity, wave: usize },
    AllWavesComplete { spawner: Entity },
    ShieldChanged { spawner: Entity, up: bool },
    SpawnerDestroyed { spawner: Entity },

    /// One-shot clip at a position, or on the player's nanobots if `None`
    PlayOneShot { clip: String, position: Option<Vec3> },
    PlayLooping { entity: Entity, clip: String },
    StopLooping { entity: Entity },
    Announce { clip: String },

    NanobotLevelUp { level: u32, resources_for_next_level: i64 },
    NanobotStatusChanged(NanobotStatus),
    OffersPresented(Vec<RecipeId>),
    RecipeRequested { recipe: RecipeId },
    RecipeReceived { recipe: RecipeId },
    BuildStarted { recipe: RecipeId },
    BuildCompleted { recipe: RecipeId },
    PickupSpawned { recipe: RecipeId, position: Vec3 },
    ParticleEffect { effect: String, position: Vec3 },
    StatApplied { recipe: RecipeId, stat: String, modifier: f32 },
    AmmoUpgradeApplied { recipe: RecipeId },
    PassiveApplied { recipe: RecipeId },
}

/// Events raised during ticks, drained by the host.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        log::trace!("event: {event:?}");
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
