//! Profile, stats and run snapshot persistence
//!
//! The profile and the stats are small JSON documents that survive between
//! runs. A run snapshot captures the whole simulation with bincode:
//! components are serialized per entity, entity handles are stored as raw
//! bits and the entities are respawned at the same handles on load so that
//! cross references (squads, spawners, generators) stay valid.

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::components::*;
use crate::config::EnemyRoster;
use crate::context::{Clock, GameContext, GameStats, ProfileData, RunData};
use crate::pool::EntityPool;
use crate::systems::{NanobotManager, Squad, SquadRegistry};
use roguewave_logic::recipe::{RecipeId, RecipeRunState};

/// Version number for snapshot format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

// ---------------------------------------------------------------------------
// Profile and stats
// ---------------------------------------------------------------------------

pub fn save_profile<W: Write>(writer: W, profile: &ProfileData) -> Result<(), PersistenceError> {
    serde_json::to_writer_pretty(writer, profile)?;
    Ok(())
}

pub fn load_profile<R: Read>(reader: R) -> Result<ProfileData, PersistenceError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Load the profile at `path`; a missing file is a fresh profile.
pub fn load_profile_file(path: impl AsRef<Path>) -> Result<ProfileData, PersistenceError> {
    match std::fs::File::open(path.as_ref()) {
        Ok(file) => load_profile(std::io::BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no profile at {}, starting fresh", path.as_ref().display());
            Ok(ProfileData::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn save_profile_file(path: impl AsRef<Path>, profile: &ProfileData) -> Result<(), PersistenceError> {
    let file = std::fs::File::create(path)?;
    save_profile(std::io::BufWriter::new(file), profile)
}

#[derive(Debug, Serialize, Deserialize)]
struct StatEntry {
    key: String,
    value: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatsFile {
    stats: Vec<StatEntry>,
}

/// Write stats as `{"stats":[{"key":..,"value":..}]}`.
pub fn save_stats<W: Write>(writer: W, stats: &GameStats) -> Result<(), PersistenceError> {
    let file = StatsFile {
        stats: stats
            .iter()
            .map(|(key, value)| StatEntry { key: key.to_owned(), value })
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &file)?;
    Ok(())
}

pub fn load_stats<R: Read>(reader: R) -> Result<GameStats, PersistenceError> {
    let file: StatsFile = serde_json::from_reader(reader)?;
    Ok(file.stats.into_iter().map(|e| (e.key, e.value)).collect())
}

/// Load the stats at `path`; a missing file is an empty set.
pub fn load_stats_file(path: impl AsRef<Path>) -> Result<GameStats, PersistenceError> {
    match std::fs::File::open(path.as_ref()) {
        Ok(file) => load_stats(std::io::BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GameStats::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_stats_file(path: impl AsRef<Path>, stats: &mut GameStats) -> Result<(), PersistenceError> {
    let file = std::fs::File::create(path)?;
    save_stats(std::io::BufWriter::new(file), stats)?;
    stats.mark_clean();
    Ok(())
}

// ---------------------------------------------------------------------------
// Run snapshot
// ---------------------------------------------------------------------------

/// Serializable snapshot of a run
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub clock: Clock,
    pub profile: ProfileData,
    pub stats: GameStats,
    pub run: RunData,
    /// Per-run recipe state, only for recipes that have any
    pub recipe_states: Vec<(RecipeId, RecipeRunState)>,
    pub nanobots: NanobotManager,
    pub squads: Vec<SerializableSquad>,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

#[derive(Serialize, Deserialize)]
pub struct SerializableSquad {
    pub id: SquadId,
    pub leader: Option<u64>,
    pub followers: Vec<u64>,
}

/// Spawner with entity handles as raw bits
#[derive(Serialize, Deserialize)]
pub struct SerializableSpawner {
    pub config: SpawnerConfig,
    pub level: LevelDefinition,
    pub wave: Option<WaveDefinition>,
    pub next_wave_index: usize,
    pub phase: WavePhase,
    pub cursor: usize,
    pub live: Vec<u64>,
    pub generators: Vec<u64>,
    pub living_generators: u32,
    pub squad: Option<SquadId>,
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    pub id: u64,

    // Agent
    /// Prototype name, resolved against the roster on load
    pub profile: Option<String>,
    pub pose: Option<Pose>,
    pub motion: Option<Motion>,
    pub brain: Option<Brain>,
    pub target_range: Option<TargetRange>,
    pub perception: Option<Perception>,
    pub sight: Option<SightState>,
    pub awareness: Option<Awareness>,
    pub squad: Option<SquadMembership>,
    pub pooled: Option<Pooled>,
    pub dormant: bool,
    pub spawned_by: Option<u64>,

    // Shared
    pub health: Option<Health>,

    // Spawning
    pub spawner: Option<SerializableSpawner>,
    pub shield_generator: Option<u64>,
}

fn bits(entity: Entity) -> u64 {
    entity.to_bits().get()
}

fn handle(bits: u64) -> Option<Entity> {
    Entity::from_bits(bits)
}

fn handles(bits: &[u64]) -> Vec<Entity> {
    bits.iter().filter_map(|b| handle(*b)).collect()
}

/// Extract all entities from a world into serializable form
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    let mut entities = Vec::new();

    for entity_ref in world.iter() {
        let mut se = SerializableEntity { id: bits(entity_ref.entity()), ..Default::default() };

        if let Some(c) = entity_ref.get::<&Profile>() {
            se.profile = Some(c.name.clone());
        }
        if let Some(c) = entity_ref.get::<&Pose>() {
            se.pose = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Motion>() {
            se.motion = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Brain>() {
            se.brain = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&TargetRange>() {
            se.target_range = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Perception>() {
            se.perception = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&SightState>() {
            se.sight = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Awareness>() {
            se.awareness = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&SquadMembership>() {
            se.squad = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Pooled>() {
            se.pooled = Some((*c).clone());
        }
        se.dormant = entity_ref.has::<Dormant>();
        if let Some(c) = entity_ref.get::<&SpawnedBy>() {
            se.spawned_by = Some(bits(c.0));
        }
        if let Some(c) = entity_ref.get::<&Health>() {
            se.health = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Spawner>() {
            se.spawner = Some(SerializableSpawner {
                config: c.config.clone(),
                level: c.level.clone(),
                wave: c.wave.clone(),
                next_wave_index: c.next_wave_index,
                phase: c.phase,
                cursor: c.cursor,
                live: c.live.iter().map(|e| bits(*e)).collect(),
                generators: c.generators.iter().map(|e| bits(*e)).collect(),
                living_generators: c.living_generators,
                squad: c.squad,
            });
        }
        if let Some(c) = entity_ref.get::<&ShieldGenerator>() {
            se.shield_generator = Some(bits(c.spawner));
        }

        entities.push(se);
    }

    entities
}

/// Respawn an entity at its saved handle with all its components
fn spawn_entity(world: &mut World, pool: &mut EntityPool, roster: &EnemyRoster, se: SerializableEntity) {
    let Some(entity) = handle(se.id) else {
        log::error!("snapshot entity with invalid handle {}", se.id);
        return;
    };

    let profile = match &se.profile {
        Some(name) => match roster.get(name) {
            Some(profile) => Some(Arc::clone(profile)),
            None => {
                log::error!("snapshot names unknown enemy prototype '{name}', dropping entity");
                return;
            }
        },
        None => None,
    };

    world.spawn_at(entity, ());

    if let Some(profile) = profile {
        let _ = world.insert(entity, (Profile(profile), ChallengeCache::default()));
    }
    if let Some(c) = se.pose {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.motion {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.brain {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.target_range {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.perception {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.sight {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.awareness {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.squad {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.pooled {
        if se.dormant {
            pool.adopt(&c.prototype, entity);
            let _ = world.insert_one(entity, Dormant);
        }
        let _ = world.insert_one(entity, c);
    }
    if let Some(spawner) = se.spawned_by.and_then(handle) {
        let _ = world.insert_one(entity, SpawnedBy(spawner));
    }
    if let Some(c) = se.health {
        let _ = world.insert_one(entity, c);
    }
    if let Some(s) = se.spawner {
        let spawner = Spawner {
            config: s.config,
            level: s.level,
            wave: s.wave,
            next_wave_index: s.next_wave_index,
            phase: s.phase,
            cursor: s.cursor,
            live: handles(&s.live),
            generators: handles(&s.generators),
            living_generators: s.living_generators,
            squad: s.squad,
        };
        let _ = world.insert_one(entity, spawner);
    }
    if let Some(spawner) = se.shield_generator.and_then(handle) {
        let _ = world.insert_one(entity, ShieldGenerator { spawner });
    }
}

/// Save a run snapshot to a writer
pub fn save_snapshot<W: Write>(
    writer: W,
    world: &World,
    squads: &SquadRegistry,
    ctx: &GameContext,
    nanobots: &NanobotManager,
) -> Result<(), PersistenceError> {
    let recipe_states = ctx
        .catalog
        .iter()
        .map(|r| (r.id.clone(), ctx.catalog.run_state(&r.id).clone()))
        .filter(|(_, state)| !state.is_clear())
        .collect();

    let save_data = SaveData {
        version: SAVE_VERSION,
        clock: ctx.clock,
        profile: ctx.profile.clone(),
        stats: ctx.stats.clone(),
        run: ctx.run.clone(),
        recipe_states,
        nanobots: nanobots.clone(),
        squads: squads
            .iter()
            .map(|(id, squad)| SerializableSquad {
                id,
                leader: squad.leader.map(bits),
                followers: squad.followers.iter().map(|e| bits(*e)).collect(),
            })
            .collect(),
        entities: serialize_entities(world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Result of loading a snapshot
pub struct LoadedSnapshot {
    pub world: World,
    pub squads: SquadRegistry,
    pub pool: EntityPool,
    pub clock: Clock,
    pub profile: ProfileData,
    pub stats: GameStats,
    pub run: RunData,
    pub recipe_states: Vec<(RecipeId, RecipeRunState)>,
    pub nanobots: NanobotManager,
}

/// Load a run snapshot from a reader. Agent profiles are resolved by name
/// against `roster`.
pub fn load_snapshot<R: Read>(reader: R, roster: &EnemyRoster) -> Result<LoadedSnapshot, PersistenceError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    let mut pool = EntityPool::new();
    for se in save_data.entities {
        spawn_entity(&mut world, &mut pool, roster, se);
    }

    let squads = SquadRegistry::restore(save_data.squads.into_iter().map(|s| {
        let squad = Squad {
            leader: s.leader.and_then(handle).filter(|e| world.contains(*e)),
            followers: handles(&s.followers).into_iter().filter(|e| world.contains(*e)).collect(),
        };
        (s.id, squad)
    }));

    Ok(LoadedSnapshot {
        world,
        squads,
        pool,
        clock: save_data.clock,
        profile: save_data.profile,
        stats: save_data.stats,
        run: save_data.run,
        recipe_states: save_data.recipe_states,
        nanobots: save_data.nanobots,
    })
}
