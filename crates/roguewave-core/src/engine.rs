//! Simulation engine - main entry point for running the simulation

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::components::*;
use crate::config::{EngineConfig, EnemyRoster};
use crate::context::{GameContext, GameStats, ProfileData, ENEMIES_SPAWNED};
use crate::events::{EventQueue, GameEvent};
use crate::persistence::{self, PersistenceError};
use crate::pool::EntityPool;
use crate::systems::*;
use roguewave_logic::catalog::RecipeCatalog;
use roguewave_logic::destination::MapBounds;
use roguewave_logic::recipe::{PlayerSnapshot, RecipeId};
use roguewave_logic::sight::TargetInfo;
use roguewave_logic::spatial::SpatialQuery;

/// Main simulation engine
pub struct SimulationEngine<S: SpatialQuery> {
    /// ECS world containing all entities
    pub world: World,
    /// Ray-cast oracle onto the host's geometry
    pub spatial: S,
    /// Stats, recipes, profile and run data
    pub ctx: GameContext,
    pub squads: SquadRegistry,
    pub pool: EntityPool,
    pub nanobots: NanobotManager,
    pub roster: EnemyRoster,
    pub level: LevelDefinition,
    bounds: MapBounds,
    target: Option<TargetInfo>,
    events: EventQueue,
    rng: StdRng,

    // Configuration
    time_scale: f32,
}

impl<S: SpatialQuery> SimulationEngine<S> {
    /// Create an engine with an empty recipe catalog and a fresh profile
    pub fn new(config: EngineConfig, spatial: S) -> Self {
        let (catalog, _) = RecipeCatalog::load(Vec::new());
        Self::with_context(
            config,
            spatial,
            GameContext::new(catalog, ProfileData::default(), GameStats::new()),
        )
    }

    pub fn with_context(config: EngineConfig, spatial: S, ctx: GameContext) -> Self {
        let roster = EnemyRoster::new(config.enemies);
        roster.check_level(&config.level);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            world: World::new(),
            spatial,
            ctx,
            squads: SquadRegistry::new(),
            pool: EntityPool::new(),
            nanobots: NanobotManager::new(config.nanobots),
            roster,
            bounds: config.level.bounds(),
            level: config.level,
            target: None,
            events: EventQueue::new(),
            rng,
            time_scale: 1.0,
        }
    }

    /// Start a run: reset per-run recipe state and ready the nanobots
    pub fn start_session(&mut self) {
        self.nanobots.start_session(&mut self.ctx, &mut self.events, &mut self.rng);
    }

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds * self.time_scale;
        self.ctx.clock.advance(dt);
        let now = self.ctx.now();
        let frame = self.ctx.clock.frame;
        let target = self.target;

        // Resume timed sequences
        self.nanobots.run_tasks(&mut self.ctx, &mut self.events, &self.spatial, &mut self.rng);

        // Waves
        let requests = wave_system(
            &mut self.world,
            &self.roster,
            target.as_ref(),
            now,
            &mut self.events,
            &mut self.rng,
        );
        for request in requests {
            self.spawn_pooled(&request.prototype, request.position, Some(request.spawner));
        }

        // Perception
        target_distance_system(&mut self.world, target.as_ref(), now, &mut self.rng);
        sight_system(
            &mut self.world,
            &self.squads,
            target.as_ref(),
            &self.spatial,
            frame,
            &mut self.rng,
        );

        // Decisions and movement
        let nav = Navigation { bounds: &self.bounds, spatial: &self.spatial, now };
        destination_system(&mut self.world, target.as_ref(), &nav, &mut self.rng);
        steering_system(
            &mut self.world,
            &self.squads,
            target.map(|t| t.body),
            &self.spatial,
            dt,
        );

        // Audio cues
        awareness_system(&mut self.world, &mut self.events, now, &mut self.rng);

        // Nanobots
        self.nanobots.tick(&mut self.ctx, &mut self.events, &mut self.rng);
    }

    /// Set or clear what the enemies hunt
    pub fn set_target(&mut self, target: Option<TargetInfo>) {
        self.target = target;
    }

    pub fn target(&self) -> Option<&TargetInfo> {
        self.target.as_ref()
    }

    /// Push the latest player view for the build waterfall and pickup
    /// placement
    pub fn set_player(&mut self, player: PlayerSnapshot, pose: Pose) {
        self.nanobots.player = player;
        self.nanobots.player_pose = pose;
    }

    pub fn set_player_alive(&mut self, alive: bool) {
        self.nanobots.set_player_alive(&mut self.ctx, alive);
    }

    pub fn collect_resources(&mut self, amount: u32) {
        self.nanobots.collect(&mut self.ctx, amount);
    }

    pub fn choose_offer(&mut self, index: usize) -> Option<RecipeId> {
        self.nanobots.choose_offer(&self.ctx, &mut self.events, index, &mut self.rng)
    }

    /// Level complete: builds and offers stop
    pub fn enter_victory(&mut self) {
        self.nanobots.enter_victory();
    }

    /// Place a spawner using the engine's level plan
    pub fn add_spawner(&mut self, position: Vec3, config: SpawnerConfig) -> Entity {
        spawn_spawner(&mut self.world, position, config, self.level.clone())
    }

    /// Place an enemy directly, outside any wave. Direct placements do not
    /// count as spawns.
    pub fn place_enemy(&mut self, prototype: &str, position: Vec3) -> Option<Entity> {
        let Some(profile) = self.roster.get(prototype).map(Arc::clone) else {
            log::error!("cannot place unknown enemy prototype '{prototype}'");
            return None;
        };
        let entity = self.world.spawn(crate::pool::agent_bundle(&profile, position).build());
        Some(entity)
    }

    /// Take an enemy from the pool, count it and attach it to `spawner`.
    fn spawn_pooled(&mut self, prototype: &str, position: Vec3, spawner: Option<Entity>) -> Option<Entity> {
        let Some(profile) = self.roster.get(prototype).map(Arc::clone) else {
            log::error!("cannot spawn unknown enemy prototype '{prototype}'");
            return None;
        };
        let (entity, origin) = self.pool.spawn(&mut self.world, &profile, position);
        self.ctx.stats.increment(ENEMIES_SPAWNED);
        if let Some(spawner) = spawner {
            track_spawn(&mut self.world, spawner, entity);
            enlist(&mut self.world, &mut self.squads, spawner, entity);
        }
        log::debug!("spawned {prototype} ({origin:?}) at {position:?}");
        self.events.push(GameEvent::EnemySpawned { entity, prototype: prototype.to_owned() });
        Some(entity)
    }

    /// Order an enemy to attack near `position`
    pub fn request_attack(&mut self, entity: Entity, position: Vec3) -> bool {
        let nav = Navigation { bounds: &self.bounds, spatial: &self.spatial, now: self.ctx.now() };
        request_attack(&mut self.world, entity, position, &nav, &mut self.rng)
    }

    /// Apply damage to an enemy, spawner or shield generator. Spawners
    /// ignore damage while their shield is up. Returns the health change,
    /// or `None` if nothing was hurt.
    pub fn apply_damage(
        &mut self,
        entity: Entity,
        amount: f32,
        source: Option<DamageSource>,
    ) -> Option<HealthChange> {
        if !self.world.get::<&Health>(entity).map(|h| h.alive).unwrap_or(false) {
            return None;
        }

        if let Ok(shield_up) = self.world.get::<&Spawner>(entity).map(|s| s.shield_up()) {
            if shield_up {
                log::debug!("spawner {:?} shielded, damage ignored", entity);
                return None;
            }
            let change = damage_entity(&mut self.world, entity, amount)?;
            if change.died {
                let doomed = spawner_destroyed(&mut self.world, entity, &mut self.ctx.stats, &mut self.events);
                for agent in doomed {
                    self.kill_agent(agent);
                }
            }
            return Some(change);
        }

        if self.world.get::<&ShieldGenerator>(entity).is_ok() {
            let change = damage_entity(&mut self.world, entity, amount)?;
            if change.died {
                generator_destroyed(&mut self.world, entity, &mut self.events);
                let _ = self.world.despawn(entity);
            }
            return Some(change);
        }

        let change = damage_entity(&mut self.world, entity, amount)?;
        self.defend(entity, &change, source.as_ref());
        if change.died {
            self.kill_agent(entity);
        }
        Some(change)
    }

    fn defend(&mut self, entity: Entity, change: &HealthChange, source: Option<&DamageSource>) {
        let (config, position) = match self.world.query_one_mut::<(&Profile, &Pose)>(entity) {
            Ok((profile, pose)) => match &profile.defensive {
                Some(config) => (config.clone(), pose.position),
                None => return,
            },
            Err(_) => return,
        };
        if !triggers_defensive_spawn(&config, change) {
            return;
        }

        let attack_at = self
            .target
            .map(|t| t.position)
            .or(source.map(|s| s.position))
            .unwrap_or(position);
        let mut units = Vec::new();
        for (prototype, at) in defensive_spawns(&config, position, source, &mut self.rng) {
            if let Some(unit) = self.spawn_pooled(&prototype, at, None) {
                self.request_attack(unit, attack_at);
                units.push(unit);
            }
        }
        if !units.is_empty() {
            self.events.push(GameEvent::DefensiveUnitsSpawned { source: entity, units });
        }
    }

    /// Run an enemy's death and return it to the pool
    fn kill_agent(&mut self, entity: Entity) {
        if let Ok(mut health) = self.world.get::<&mut Health>(entity) {
            health.current = 0.0;
        }
        agent_death(&mut self.world, entity, &mut self.ctx.stats, &mut self.events, &mut self.rng);
        self.squads.leave(&mut self.world, entity);
        forget_spawn(&mut self.world, entity);
        self.pool.release(&mut self.world, entity);
    }

    /// Events raised since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(0.0, 100.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn now(&self) -> f32 {
        self.ctx.now()
    }

    /// Living enemy agents
    pub fn agent_count(&self) -> usize {
        self.world
            .query::<(&Profile, &Health)>()
            .iter()
            .filter(|(_, (_, h))| h.alive)
            .count()
    }

    pub fn spawner_count(&self) -> usize {
        self.world.query::<&Spawner>().iter().count()
    }

    /// Save a run snapshot
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), PersistenceError> {
        persistence::save_snapshot(writer, &self.world, &self.squads, &self.ctx, &self.nanobots)
    }

    /// Load a run snapshot, replacing the current run. The target is
    /// cleared until the host sets it again.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), PersistenceError> {
        let loaded = persistence::load_snapshot(reader, &self.roster)?;

        self.world = loaded.world;
        self.squads = loaded.squads;
        self.pool = loaded.pool;
        self.ctx.clock = loaded.clock;
        self.ctx.profile = loaded.profile;
        self.ctx.stats = loaded.stats;
        self.ctx.run = loaded.run;
        self.ctx.catalog.reset_run_state();
        for (id, state) in loaded.recipe_states {
            match self.ctx.catalog.run_state_mut(&id) {
                Some(slot) => *slot = state,
                None => log::warn!("snapshot has state for unknown recipe {id}"),
            }
        }
        self.nanobots = loaded.nanobots;
        self.target = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ENEMY_KILLS, SPAWNERS_DESTROYED};
    use roguewave_logic::geometry::BoundingBox;
    use roguewave_logic::spatial::{BodyId, BoxWorld, SurfaceTag};

    fn config() -> EngineConfig {
        EngineConfig {
            seed: Some(42),
            level: LevelDefinition {
                waves: vec![WaveDefinition {
                    enemies: vec!["drone".into()],
                    spawn_rate: 0.5,
                    spawn_amount: 2,
                    wave_duration: 3.0,
                    ..WaveDefinition::default()
                }],
                generate_new_waves: false,
                ..LevelDefinition::default()
            },
            enemies: vec![EnemyProfile { name: "drone".into(), ..EnemyProfile::default() }],
            ..EngineConfig::default()
        }
    }

    fn engine() -> SimulationEngine<BoxWorld> {
        SimulationEngine::new(config(), BoxWorld::with_ground(0.0))
    }

    #[test]
    fn test_engine_creation() {
        let engine = engine();
        assert_eq!(engine.agent_count(), 0);
        assert_eq!(engine.now(), 0.0);
        assert_eq!(engine.roster.len(), 1);
    }

    #[test]
    fn test_waves_spawn_enemies() {
        let mut engine = engine();
        engine.add_spawner(Vec3::new(100.0, 5.0, 100.0), SpawnerConfig::default());
        for _ in 0..120 {
            engine.update(1.0 / 30.0);
        }
        assert!(engine.agent_count() > 0);
        assert_eq!(engine.ctx.stats.value(ENEMIES_SPAWNED) as usize, engine.agent_count());
        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::WaveStarted { wave: 1, .. })));
    }

    #[test]
    fn test_direct_placement_is_not_counted() {
        let mut engine = engine();
        assert!(engine.place_enemy("drone", Vec3::new(50.0, 5.0, 50.0)).is_some());
        assert!(engine.place_enemy("ghost", Vec3::ZERO).is_none());
        assert_eq!(engine.agent_count(), 1);
        assert_eq!(engine.ctx.stats.value(ENEMIES_SPAWNED), 0);
    }

    #[test]
    fn test_killing_an_agent_returns_it_to_the_pool() {
        let mut engine = engine();
        let spawner = engine.add_spawner(Vec3::new(100.0, 5.0, 100.0), SpawnerConfig::default());
        for _ in 0..30 {
            engine.update(1.0 / 30.0);
        }
        let live = engine.world.get::<&Spawner>(spawner).unwrap().live.clone();
        assert!(!live.is_empty());

        let victim = live[0];
        let change = engine.apply_damage(victim, 1000.0, None).expect("damaged");
        assert!(change.died);
        assert_eq!(engine.ctx.stats.value(ENEMY_KILLS), 1);
        assert!(!engine.world.get::<&Spawner>(spawner).unwrap().live.contains(&victim));
        assert_eq!(engine.pool.dormant_count("drone"), 1);
        assert!(engine.apply_damage(victim, 10.0, None).is_none());
    }

    #[test]
    fn test_shield_blocks_spawner_damage() {
        let mut engine = engine();
        let config = SpawnerConfig { shield_generators: 1, destroy_spawns_on_death: true, ..SpawnerConfig::default() };
        let spawner = engine.add_spawner(Vec3::new(100.0, 5.0, 100.0), config);
        for _ in 0..30 {
            engine.update(1.0 / 30.0);
        }
        assert!(engine.apply_damage(spawner, 10.0, None).is_none());

        let generator = engine.world.get::<&Spawner>(spawner).unwrap().generators[0];
        engine.apply_damage(generator, 10_000.0, None);
        assert!(!engine.world.get::<&Spawner>(spawner).unwrap().shield_up());
        assert!(engine
            .drain_events()
            .contains(&GameEvent::ShieldChanged { spawner, up: false }));

        let spawned = engine.world.get::<&Spawner>(spawner).unwrap().live.len() as i64;
        let change = engine.apply_damage(spawner, 100_000.0, None).expect("spawner hit");
        assert!(change.died);
        assert_eq!(engine.ctx.stats.value(SPAWNERS_DESTROYED), 1);
        assert_eq!(engine.ctx.stats.value(ENEMY_KILLS), spawned);
        assert_eq!(engine.agent_count(), 0);
    }

    fn hive_engine() -> SimulationEngine<BoxWorld> {
        SimulationEngine::new(
            EngineConfig {
                enemies: vec![
                    EnemyProfile {
                        name: "hive".into(),
                        defensive: Some(DefensiveSpawnConfig {
                            prototypes: vec!["mite".into()],
                            ..DefensiveSpawnConfig::default()
                        }),
                        ..EnemyProfile::default()
                    },
                    EnemyProfile { name: "mite".into(), squad_role: SquadRole::None, ..EnemyProfile::default() },
                ],
                ..config()
            },
            BoxWorld::with_ground(0.0),
        )
    }

    fn defenders(events: &[GameEvent]) -> Vec<Entity> {
        events
            .iter()
            .find_map(|e| match e {
                GameEvent::DefensiveUnitsSpawned { units, .. } => Some(units.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    const HIT_FROM: DamageSource = DamageSource {
        position: Vec3 { x: 80.0, y: 1.0, z: 60.0 },
        forward: Vec3::LEFT,
    };

    #[test]
    fn test_defensive_units_attack_the_target() {
        let mut engine = hive_engine();
        let target = Vec3::new(150.0, 1.0, 150.0);
        engine.set_target(Some(TargetInfo { position: target, body: BodyId(1) }));
        let hive = engine.place_enemy("hive", Vec3::new(60.0, 5.0, 60.0)).expect("hive");
        engine.apply_damage(hive, 50.0, Some(HIT_FROM));

        let units = defenders(&engine.drain_events());
        assert_eq!(units.len(), 3);
        for unit in units {
            let brain = engine.world.get::<&Brain>(unit).unwrap();
            assert_eq!(brain.state, AgentState::UnderOrders);
            let goal = brain.goal.expect("ordered goal");
            assert!(goal.distance(&target) <= 0.2 + 1e-3);
        }
    }

    #[test]
    fn test_defensive_units_fall_back_to_the_attacker() {
        let mut engine = hive_engine();
        let hive = engine.place_enemy("hive", Vec3::new(60.0, 5.0, 60.0)).expect("hive");
        engine.apply_damage(hive, 50.0, Some(HIT_FROM));

        let units = defenders(&engine.drain_events());
        assert_eq!(units.len(), 3);
        for unit in units {
            let goal = engine.world.get::<&Brain>(unit).unwrap().goal.expect("ordered goal");
            assert!(goal.distance(&HIT_FROM.position) <= 0.2 + 1e-3);
        }
    }

    #[test]
    fn test_lethal_hit_still_calls_defenders() {
        let mut engine = hive_engine();
        let hive = engine.place_enemy("hive", Vec3::new(60.0, 5.0, 60.0)).expect("hive");
        let change = engine.apply_damage(hive, 10_000.0, Some(HIT_FROM)).expect("hive hit");
        assert!(change.died);

        let events = engine.drain_events();
        let units = defenders(&events);
        assert_eq!(units.len(), 3);
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemyDied { entity, .. } if *entity == hive)));
        assert_eq!(engine.agent_count(), 3);
        assert!(!engine.world.contains(hive));
    }

    #[test]
    fn test_agents_close_on_a_visible_target() {
        let target = Vec3::new(60.0, 1.0, 75.0);
        let mut world = BoxWorld::with_ground(0.0);
        world.add_box(
            BodyId(99),
            BoundingBox::centered(target + Vec3::UP, Vec3::new(1.0, 2.0, 1.0)),
            1,
            SurfaceTag::Agent,
        );
        let mut engine = SimulationEngine::new(config(), world);
        let agent = engine.place_enemy("drone", Vec3::new(60.0, 5.0, 60.0)).expect("drone");
        engine.set_target(Some(TargetInfo { position: target, body: BodyId(99) }));
        let start = engine.world.get::<&Pose>(agent).unwrap().position;
        for _ in 0..90 {
            engine.update(1.0 / 30.0);
        }
        assert!(engine.world.get::<&Perception>(agent).unwrap().can_see);
        assert_eq!(engine.world.get::<&Brain>(agent).unwrap().state, AgentState::Attacking);
        let end = engine.world.get::<&Pose>(agent).unwrap().position;
        assert!(end.distance(&target) < start.distance(&target));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut engine = engine();
        let spawner = engine.add_spawner(Vec3::new(100.0, 5.0, 100.0), SpawnerConfig::default());
        for _ in 0..60 {
            engine.update(1.0 / 30.0);
        }
        let agents = engine.agent_count();
        let time = engine.now();

        let mut buffer = Vec::new();
        engine.save(&mut buffer).expect("save failed");

        let mut loaded = self::engine();
        loaded.load(&buffer[..]).expect("load failed");
        assert_eq!(loaded.agent_count(), agents);
        assert!((loaded.now() - time).abs() < 1e-4);
        assert_eq!(
            loaded.world.get::<&Spawner>(spawner).unwrap().live.len(),
            engine.world.get::<&Spawner>(spawner).unwrap().live.len()
        );
        loaded.update(1.0 / 30.0);
    }

    #[test]
    fn test_time_scale() {
        let mut engine = engine();
        engine.set_time_scale(2.0);
        engine.update(0.5);
        assert!((engine.now() - 1.0).abs() < 1e-5);
        engine.set_time_scale(-1.0);
        assert_eq!(engine.time_scale(), 0.0);
    }
}
