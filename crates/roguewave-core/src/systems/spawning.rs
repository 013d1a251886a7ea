//! Spawn director - wave pacing, shield generators and spawner death

use super::SquadRegistry;
use crate::components::*;
use crate::config::EnemyRoster;
use crate::context::{GameStats, SPAWNERS_DESTROYED};
use crate::events::{EventQueue, GameEvent};
use hecs::{Entity, World};
use rand::Rng;
use roguewave_logic::geometry::{random_inside_unit_sphere, yaw};
use roguewave_logic::sight::TargetInfo;

/// Spawn interval floor for generated waves
pub const MIN_GENERATED_SPAWN_RATE: f32 = 0.1;

/// An enemy a spawner wants created this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub spawner: Entity,
    pub prototype: String,
    pub position: Vec3,
}

/// Create a spawner with its ring of shield generators.
pub fn spawn_spawner(
    world: &mut World,
    position: Vec3,
    config: SpawnerConfig,
    level: LevelDefinition,
) -> Entity {
    let generators = config.shield_generators;
    let generator_health = config.generator_health;
    let orbit = config.spawn_radius.max(1.0);
    let spawner = world.spawn((
        Pose::new(position, Vec3::FORWARD),
        Health::new(config.health_max),
        Spawner::new(config, level),
    ));

    let mut ring = Vec::with_capacity(generators as usize);
    for i in 0..generators {
        let heading = yaw(Vec3::FORWARD, 360.0 * i as f32 / generators as f32);
        ring.push(world.spawn((
            Pose::new(position + heading * orbit, heading),
            Health::new(generator_health),
            ShieldGenerator { spawner },
        )));
    }
    if let Ok(mut s) = world.get::<&mut Spawner>(spawner) {
        s.living_generators = ring.len() as u32;
        s.generators = ring;
    }
    log::info!("spawner {:?} placed with {} shield generators", spawner, generators);
    spawner
}

/// Advance every living spawner's wave cycle and collect the enemies to
/// spawn this tick.
pub fn wave_system(
    world: &mut World,
    roster: &EnemyRoster,
    target: Option<&TargetInfo>,
    now: f32,
    events: &mut EventQueue,
    rng: &mut impl Rng,
) -> Vec<SpawnRequest> {
    let mut requests = Vec::new();

    for (entity, (spawner, pose, health)) in
        world.query_mut::<(&mut Spawner, &Pose, &Health)>()
    {
        if !health.alive {
            continue;
        }
        match spawner.phase {
            WavePhase::Finished => {}
            WavePhase::Waiting { until } => {
                if now < until {
                    continue;
                }
                if next_wave(spawner, roster, entity, events, rng) {
                    let wave = spawner.wave.as_ref().map_or((0.0, 0.0), |w| (w.wave_duration, w.spawn_rate));
                    spawner.phase = WavePhase::Spawning {
                        wave_end: now + wave.0,
                        next_burst: now + wave.1.max(0.0),
                    };
                    events.push(GameEvent::WaveStarted {
                        spawner: entity,
                        wave: spawner.next_wave_index,
                    });
                } else {
                    spawner.phase = WavePhase::Finished;
                }
            }
            WavePhase::Spawning { wave_end, next_burst } => {
                if now >= wave_end {
                    spawner.phase = WavePhase::Waiting {
                        until: now + spawner.config.time_between_waves,
                    };
                    continue;
                }
                if now < next_burst {
                    continue;
                }
                let Some(wave) = spawner.wave.clone() else {
                    continue;
                };
                spawner.phase = WavePhase::Spawning {
                    wave_end,
                    next_burst: now + wave.spawn_rate.max(0.0),
                };
                if !is_active(&spawner.config, pose.position, target) {
                    continue;
                }

                let before = requests.len();
                for _ in 0..wave.spawn_amount {
                    if !spawner.has_room(requests.len() - before) {
                        break;
                    }
                    let Some(prototype) = wave.next_enemy(&mut spawner.cursor, rng) else {
                        log::error!("no enemy prototype found in wave definition");
                        break;
                    };
                    let offset = random_inside_unit_sphere(rng) * spawner.config.spawn_radius;
                    requests.push(SpawnRequest {
                        spawner: entity,
                        prototype: prototype.to_owned(),
                        position: pose.position + offset,
                    });
                }
            }
        }
    }
    requests
}

/// Zero range means always active; otherwise the target must be in range.
fn is_active(config: &SpawnerConfig, position: Vec3, target: Option<&TargetInfo>) -> bool {
    if config.active_range <= 0.0 {
        return true;
    }
    target.is_some_and(|t| {
        t.position.distance_squared(&position) <= config.active_range * config.active_range
    })
}

/// Move to the next wave. Returns false once there are no more waves.
fn next_wave(
    spawner: &mut Spawner,
    roster: &EnemyRoster,
    entity: Entity,
    events: &mut EventQueue,
    rng: &mut impl Rng,
) -> bool {
    let index = spawner.next_wave_index;
    spawner.next_wave_index += 1;
    spawner.cursor = 0;

    if let Some(wave) = spawner.level.waves.get(index) {
        spawner.wave = Some(wave.clone());
        return true;
    }

    if index == spawner.level.waves.len() {
        events.push(GameEvent::AllWavesComplete { spawner: entity });
    }
    if !spawner.level.generate_new_waves {
        log::warn!("no more waves to spawn");
        spawner.wave = None;
        return false;
    }

    match generate_wave(spawner, roster, rng) {
        Some(wave) => {
            log::debug!(
                "generated wave {}: rate {:.2}s, duration {:.1}s",
                index,
                wave.spawn_rate,
                wave.wave_duration
            );
            spawner.wave = Some(wave);
            true
        }
        None => {
            log::error!("cannot generate a wave: no enemy prototypes available");
            spawner.wave = None;
            false
        }
    }
}

/// A faster, longer wave drawn from every prototype the level uses.
fn generate_wave(
    spawner: &Spawner,
    roster: &EnemyRoster,
    rng: &mut impl Rng,
) -> Option<WaveDefinition> {
    let last = spawner
        .wave
        .clone()
        .or_else(|| spawner.level.waves.last().cloned())
        .unwrap_or_default();

    let mut enemies: Vec<String> = spawner
        .level
        .waves
        .iter()
        .flat_map(|w| w.enemies.iter().cloned())
        .collect();
    if enemies.is_empty() {
        enemies = roster
            .names()
            .filter(|name| roster.get(name).is_some_and(|p| p.available_to_waves))
            .map(str::to_owned)
            .collect();
    }
    if enemies.is_empty() {
        return None;
    }

    Some(WaveDefinition {
        enemies,
        spawn_rate: (last.spawn_rate - 0.1).max(MIN_GENERATED_SPAWN_RATE),
        spawn_amount: last.spawn_amount,
        wave_duration: last.wave_duration + rng.gen_range(1.0..5.0),
        order: SpawnOrder::Random,
    })
}

/// Put a freshly spawned agent in the spawner's squad. A leader starts a
/// new squad; followers join the spawner's current squad if it still exists.
pub fn enlist(world: &mut World, squads: &mut SquadRegistry, spawner: Entity, agent: Entity) {
    let role = match world.get::<&Profile>(agent) {
        Ok(profile) => profile.squad_role,
        Err(_) => return,
    };
    let current = world.get::<&Spawner>(spawner).ok().and_then(|s| s.squad);
    match role {
        SquadRole::Leader => {
            let id = squads.form(world, agent);
            if let Ok(mut s) = world.get::<&mut Spawner>(spawner) {
                s.squad = Some(id);
            }
        }
        SquadRole::Fodder => {
            if let Some(id) = current.filter(|id| squads.contains(*id)) {
                squads.join(world, id, agent);
            }
        }
        SquadRole::None => {}
    }
}

/// Record a newly spawned enemy on its spawner.
pub fn track_spawn(world: &mut World, spawner: Entity, agent: Entity) {
    if let Ok(mut s) = world.get::<&mut Spawner>(spawner) {
        s.live.push(agent);
    }
    let _ = world.insert_one(agent, SpawnedBy(spawner));
}

/// Drop a dead enemy from its spawner's live list.
pub fn forget_spawn(world: &mut World, agent: Entity) {
    let Ok(spawner) = world.get::<&SpawnedBy>(agent).map(|s| s.0) else {
        return;
    };
    if let Ok(mut s) = world.get::<&mut Spawner>(spawner) {
        s.live.retain(|e| *e != agent);
    }
    let _ = world.remove_one::<SpawnedBy>(agent);
}

/// A shield generator died. Emits a shield change when the last one goes.
pub fn generator_destroyed(world: &mut World, generator: Entity, events: &mut EventQueue) {
    let Ok(spawner) = world.get::<&ShieldGenerator>(generator).map(|g| g.spawner) else {
        return;
    };
    let Ok(mut s) = world.get::<&mut Spawner>(spawner) else {
        return;
    };
    let before = s.living_generators;
    s.living_generators = before.saturating_sub(1);
    s.generators.retain(|g| *g != generator);
    if before != 0 && s.living_generators == 0 {
        log::info!("spawner {:?} shield down", spawner);
        events.push(GameEvent::ShieldChanged { spawner, up: false });
    }
}

/// A spawner died. Returns the enemies that must die with it.
pub fn spawner_destroyed(
    world: &mut World,
    spawner: Entity,
    stats: &mut GameStats,
    events: &mut EventQueue,
) -> Vec<Entity> {
    let Ok(mut s) = world.get::<&mut Spawner>(spawner) else {
        return Vec::new();
    };
    s.phase = WavePhase::Finished;
    stats.increment(SPAWNERS_DESTROYED);
    events.push(GameEvent::SpawnerDestroyed { spawner });
    log::info!("spawner {:?} destroyed with {} live enemies", spawner, s.live.len());
    if s.config.destroy_spawns_on_death {
        std::mem::take(&mut s.live)
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster() -> EnemyRoster {
        EnemyRoster::new([
            EnemyProfile { name: "drone".into(), ..EnemyProfile::default() },
            EnemyProfile { name: "boss".into(), available_to_waves: false, ..EnemyProfile::default() },
        ])
    }

    fn level(waves: Vec<WaveDefinition>) -> LevelDefinition {
        LevelDefinition { waves, generate_new_waves: false, ..LevelDefinition::default() }
    }

    fn drone_wave() -> WaveDefinition {
        WaveDefinition {
            enemies: vec!["drone".into()],
            spawn_rate: 1.0,
            spawn_amount: 2,
            wave_duration: 3.0,
            order: SpawnOrder::Sequential,
        }
    }

    fn run(world: &mut World, events: &mut EventQueue, until: f32) -> Vec<SpawnRequest> {
        let roster = roster();
        let mut rng = StdRng::seed_from_u64(1);
        let mut all = Vec::new();
        let mut now = 0.0;
        while now <= until {
            all.extend(wave_system(world, &roster, None, now, events, &mut rng));
            now += 0.25;
        }
        all
    }

    #[test]
    fn test_wave_bursts_then_finishes() {
        let mut world = World::new();
        let mut events = EventQueue::new();
        let config = SpawnerConfig { shield_generators: 0, ..SpawnerConfig::default() };
        let spawner = spawn_spawner(&mut world, Vec3::new(50.0, 2.0, 50.0), config, level(vec![drone_wave()]));

        let requests = run(&mut world, &mut events, 20.0);
        // bursts at 1s and 2s, two enemies each
        assert_eq!(requests.len(), 4);
        for r in &requests {
            assert_eq!(r.prototype, "drone");
            assert!(r.position.distance(&Vec3::new(50.0, 2.0, 50.0)) <= 5.0 + 1e-4);
        }
        let events = events.drain();
        assert!(events.contains(&GameEvent::WaveStarted { spawner, wave: 1 }));
        assert!(events.contains(&GameEvent::AllWavesComplete { spawner }));
        assert_eq!(world.get::<&Spawner>(spawner).unwrap().phase, WavePhase::Finished);
    }

    #[test]
    fn test_max_alive_caps_bursts() {
        let mut world = World::new();
        let mut events = EventQueue::new();
        let mut lvl = level(vec![drone_wave()]);
        lvl.max_alive = 1;
        let config = SpawnerConfig { shield_generators: 0, ..SpawnerConfig::default() };
        let spawner = spawn_spawner(&mut world, Vec3::ZERO, config, lvl);

        let roster = roster();
        let mut rng = StdRng::seed_from_u64(1);
        wave_system(&mut world, &roster, None, 0.0, &mut events, &mut rng);
        let burst = wave_system(&mut world, &roster, None, 1.0, &mut events, &mut rng);
        assert_eq!(burst.len(), 1);

        let agent = world.spawn((Health::new(1.0),));
        track_spawn(&mut world, spawner, agent);
        let blocked = wave_system(&mut world, &roster, None, 2.0, &mut events, &mut rng);
        assert!(blocked.is_empty());

        forget_spawn(&mut world, agent);
        assert!(world.get::<&Spawner>(spawner).unwrap().live.is_empty());
    }

    #[test]
    fn test_active_range_pauses_spawning() {
        let config = SpawnerConfig { active_range: 10.0, ..SpawnerConfig::default() };
        let near = TargetInfo { position: Vec3::new(5.0, 0.0, 0.0), body: roguewave_logic::spatial::BodyId(1) };
        let far = TargetInfo { position: Vec3::new(50.0, 0.0, 0.0), ..near };
        assert!(is_active(&config, Vec3::ZERO, Some(&near)));
        assert!(!is_active(&config, Vec3::ZERO, Some(&far)));
        assert!(!is_active(&config, Vec3::ZERO, None));
        assert!(is_active(&SpawnerConfig::default(), Vec3::ZERO, None));
    }

    #[test]
    fn test_generated_waves_get_faster_and_longer() {
        let roster = roster();
        let mut rng = StdRng::seed_from_u64(2);
        let mut spawner = Spawner::new(SpawnerConfig::default(), LevelDefinition::default());
        spawner.wave = Some(WaveDefinition { spawn_rate: 0.15, wave_duration: 10.0, ..drone_wave() });

        let wave = generate_wave(&spawner, &roster, &mut rng).expect("generated");
        assert_eq!(wave.spawn_rate, MIN_GENERATED_SPAWN_RATE);
        assert!(wave.wave_duration >= 11.0 && wave.wave_duration < 15.0);
        assert_eq!(wave.order, SpawnOrder::Random);
        // no authored waves, so the roster supplies wave-eligible prototypes
        assert_eq!(wave.enemies, vec!["drone".to_string()]);
    }

    #[test]
    fn test_shield_drops_with_last_generator() {
        let mut world = World::new();
        let mut events = EventQueue::new();
        let config = SpawnerConfig { shield_generators: 2, ..SpawnerConfig::default() };
        let spawner = spawn_spawner(&mut world, Vec3::ZERO, config, LevelDefinition::default());
        let generators = world.get::<&Spawner>(spawner).unwrap().generators.clone();
        assert_eq!(generators.len(), 2);
        assert!(world.get::<&Spawner>(spawner).unwrap().shield_up());

        generator_destroyed(&mut world, generators[0], &mut events);
        assert!(events.is_empty());
        generator_destroyed(&mut world, generators[1], &mut events);
        assert_eq!(events.drain(), vec![GameEvent::ShieldChanged { spawner, up: false }]);
        assert!(!world.get::<&Spawner>(spawner).unwrap().shield_up());
    }

    #[test]
    fn test_spawner_death_takes_its_enemies() {
        let mut world = World::new();
        let mut events = EventQueue::new();
        let mut stats = GameStats::new();
        let spawner = spawn_spawner(&mut world, Vec3::ZERO, SpawnerConfig::default(), LevelDefinition::default());
        let a = world.spawn((Health::new(1.0),));
        track_spawn(&mut world, spawner, a);

        let doomed = spawner_destroyed(&mut world, spawner, &mut stats, &mut events);
        assert_eq!(doomed, vec![a]);
        assert_eq!(stats.value(SPAWNERS_DESTROYED), 1);
        assert!(events.iter().any(|e| *e == GameEvent::SpawnerDestroyed { spawner }));
    }

    #[test]
    fn test_leader_forms_squad_and_fodder_joins() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let spawner = spawn_spawner(&mut world, Vec3::ZERO, SpawnerConfig::default(), LevelDefinition::default());
        let leader_profile = std::sync::Arc::new(EnemyProfile {
            squad_role: SquadRole::Leader,
            ..EnemyProfile::default()
        });
        let fodder_profile = std::sync::Arc::new(EnemyProfile::default());
        let leader = world.spawn((Profile(leader_profile), SquadMembership::Solo));
        let fodder = world.spawn((Profile(fodder_profile), SquadMembership::Solo));

        enlist(&mut world, &mut squads, spawner, leader);
        enlist(&mut world, &mut squads, spawner, fodder);

        let id = world.get::<&Spawner>(spawner).unwrap().squad.expect("squad formed");
        assert_eq!(squads.leader(id), Some(leader));
        assert_eq!(*world.get::<&SquadMembership>(fodder).unwrap(), SquadMembership::Follows(id));
    }
}
