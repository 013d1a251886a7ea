//! Rogue Wave Headless Simulation Harness
//!
//! Validates authored data, enemy AI and the nanobot economy without a game
//! engine. Runs entirely in-process against a box-world stand-in for the
//! level geometry.
//!
//! Usage:
//!   cargo run -p roguewave-simtest
//!   cargo run -p roguewave-simtest -- --verbose --seconds 300
//!   RUST_LOG=roguewave_core=debug cargo run -p roguewave-simtest

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roguewave_core::config::{recipes_from_json, EngineConfig, EnemyRoster};
use roguewave_core::context::{
    GameContext, GameStats, ProfileData, ENEMIES_SPAWNED, ENEMY_KILLS, MAX_NANOBOT_LEVEL,
    RESOURCES_COLLECTED,
};
use roguewave_core::events::GameEvent;
use roguewave_core::prelude::*;
use roguewave_core::systems::DamageSource;
use roguewave_logic::catalog::RecipeCatalog;
use roguewave_logic::challenge::challenge_rating;
use roguewave_logic::geometry::BoundingBox;
use roguewave_logic::recipe::{Gauge, OwnedWeapon, PlayerSnapshot, RecipeCategory, RecipeId, RecipeKind};
use roguewave_logic::sight::TargetInfo;
use roguewave_logic::spatial::{BodyId, BoxWorld, SurfaceTag};
use std::collections::BTreeMap;

// ── Authored data (same files the game ships) ───────────────────────────
const ENGINE_JSON: &str = include_str!("../../../data/engine.json");
const RECIPES_JSON: &str = include_str!("../../../data/recipes.json");

const FRAME: f32 = 1.0 / 30.0;
const PLAYER_BODY: BodyId = BodyId(1);

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self { name: name.into(), passed, detail: detail.into() }
    }
}

struct Options {
    verbose: bool,
    json: bool,
    seconds: f32,
}

impl Options {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let seconds = args
            .iter()
            .position(|a| a == "--seconds")
            .and_then(|i| args.get(i + 1))
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|s| *s > 0.0)
            .unwrap_or(120.0);
        Self {
            verbose: args.iter().any(|a| a == "--verbose"),
            json: args.iter().any(|a| a == "--json"),
            seconds,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let options = Options::from_args();
    println!("=== Rogue Wave Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Authored data
    let data = match load_data() {
        Ok(data) => data,
        Err(e) => {
            println!("  ✗ data: {e}");
            std::process::exit(1);
        }
    };
    results.extend(validate_recipes(&data.catalog));
    results.extend(validate_enemies(&data.config));

    // 2. Wave and AI sweep
    results.extend(validate_wave_sweep(&data, options.seconds));

    // 3. Nanobot economy with a scripted player
    results.extend(validate_economy(&data, options.seconds));

    // 4. Snapshot mid-run
    results.extend(validate_snapshot(&data));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || options.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    if options.json {
        let summary: BTreeMap<&str, serde_json::Value> = results
            .iter()
            .map(|r| (r.name.as_str(), serde_json::json!({ "passed": r.passed, "detail": r.detail })))
            .collect();
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("cannot encode summary: {e}"),
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, results.len(), failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

struct Data {
    config: EngineConfig,
    catalog: RecipeCatalog,
}

fn load_data() -> Result<Data, String> {
    let config = EngineConfig::from_json(ENGINE_JSON).map_err(|e| format!("engine.json: {e}"))?;
    let (catalog, report) = recipes_from_json(RECIPES_JSON).map_err(|e| format!("recipes.json: {e}"))?;
    if !report.duplicates.is_empty() {
        return Err(format!("recipes.json: duplicate ids {:?}", report.duplicates));
    }
    Ok(Data { config, catalog })
}

/// A fresh engine over a walled arena. The player's body stands in the
/// middle so sight checks have something to hit.
fn arena(data: &Data, seed: u64, profile: ProfileData) -> (SimulationEngine<BoxWorld>, Vec3) {
    let mut config = data.config.clone();
    config.seed = Some(seed);
    let bounds = config.level.bounds();
    let center = bounds.center().with_y(1.0);

    let mut world = BoxWorld::with_ground(0.0);
    for (i, offset) in [(0.0, 40.0), (0.0, -40.0), (40.0, 0.0), (-40.0, 0.0)].into_iter().enumerate() {
        let size = if offset.0 == 0.0 { Vec3::new(20.0, 8.0, 2.0) } else { Vec3::new(2.0, 8.0, 20.0) };
        world.add_box(
            BodyId(100 + i as u64),
            BoundingBox::centered(Vec3::new(center.x + offset.0, 4.0, center.z + offset.1), size),
            1,
            SurfaceTag::Obstacle,
        );
    }
    world.add_box(PLAYER_BODY, BoundingBox::centered(center + Vec3::UP, Vec3::new(1.0, 2.0, 1.0)), 1, SurfaceTag::Agent);

    let ctx = GameContext::new(data.catalog.clone(), profile, GameStats::new());
    let mut engine = SimulationEngine::with_context(config, world, ctx);
    engine.set_target(Some(TargetInfo { position: center, body: PLAYER_BODY }));
    (engine, center)
}

// ── 1. Authored data ────────────────────────────────────────────────────

fn validate_recipes(catalog: &RecipeCatalog) -> Vec<TestResult> {
    println!("--- Recipes ---");
    let mut results = Vec::new();

    results.push(TestResult::new(
        "recipes_loaded",
        catalog.len() >= 10,
        format!("{} recipes", catalog.len()),
    ));

    let missing_ammo: Vec<String> = catalog
        .iter()
        .filter_map(|r| match &r.kind {
            RecipeKind::Weapon { ammo_recipe: Some(ammo), .. } if !catalog.contains(ammo) => {
                Some(format!("{} -> {}", r.id, ammo))
            }
            _ => None,
        })
        .collect();
    results.push(TestResult::new(
        "weapon_ammo_exists",
        missing_ammo.is_empty(),
        if missing_ammo.is_empty() { "every weapon's ammo recipe exists".into() } else { missing_ammo.join(", ") },
    ));

    let ammo_types: Vec<&str> = catalog
        .iter()
        .filter_map(|r| match &r.kind {
            RecipeKind::Ammo { ammo_type, .. } => Some(ammo_type.as_str()),
            _ => None,
        })
        .collect();
    let orphan_upgrades: Vec<String> = catalog
        .iter()
        .filter_map(|r| match &r.kind {
            RecipeKind::AmmoUpgrade { ammo_type } if !ammo_types.contains(&ammo_type.as_str()) => {
                Some(r.id.to_string())
            }
            _ => None,
        })
        .collect();
    results.push(TestResult::new(
        "ammo_upgrades_match_ammo",
        orphan_upgrades.is_empty(),
        format!("{} orphan upgrades", orphan_upgrades.len()),
    ));

    let power_ups = catalog.power_ups().count();
    results.push(TestResult::new(
        "power_ups_offerable",
        power_ups >= 3,
        format!("{power_ups} power-ups, offers need at least 3"),
    ));

    let empty: Vec<_> = RecipeCategory::ALL
        .iter()
        .filter(|c| catalog.of_category(**c).next().is_none())
        .collect();
    results.push(TestResult::new(
        "every_category_authored",
        empty.is_empty(),
        format!("categories without recipes: {empty:?}"),
    ));

    results
}

fn validate_enemies(config: &EngineConfig) -> Vec<TestResult> {
    println!("--- Enemies ---");
    let mut results = Vec::new();
    let roster = EnemyRoster::new(config.enemies.clone());

    let unknown = roster.check_level(&config.level);
    results.push(TestResult::new(
        "waves_name_known_enemies",
        unknown == 0,
        format!("{unknown} unknown prototypes in {} waves", config.level.waves.len()),
    ));

    let bad_defensive: Vec<String> = config
        .enemies
        .iter()
        .filter_map(|e| e.defensive.as_ref().map(|d| (e, d)))
        .flat_map(|(e, d)| {
            d.prototypes
                .iter()
                .filter(|p| roster.get(p).is_none())
                .map(move |p| format!("{} -> {}", e.name, p))
        })
        .collect();
    results.push(TestResult::new(
        "defensive_units_known",
        bad_defensive.is_empty(),
        if bad_defensive.is_empty() { "ok".into() } else { bad_defensive.join(", ") },
    ));

    let ratings: BTreeMap<&str, i32> = config
        .enemies
        .iter()
        .map(|e| (e.name.as_str(), challenge_rating(&e.challenge_inputs())))
        .collect();
    let positive = ratings.values().all(|r| *r > 0);
    results.push(TestResult::new(
        "challenge_ratings_positive",
        positive,
        format!("{ratings:?}"),
    ));
    if let (Some(brute), Some(mite)) = (ratings.get("brute"), ratings.get("mite")) {
        results.push(TestResult::new(
            "brute_outranks_mite",
            brute > mite,
            format!("brute {brute}, mite {mite}"),
        ));
    }

    let bad_heights: Vec<&str> = config
        .enemies
        .iter()
        .filter(|e| e.steering.minimum_height > e.steering.maximum_height || e.steering.min_speed > e.steering.max_speed)
        .map(|e| e.name.as_str())
        .collect();
    results.push(TestResult::new(
        "steering_ranges_ordered",
        bad_heights.is_empty(),
        format!("{bad_heights:?}"),
    ));

    results
}

// ── 2. Wave and AI sweep ────────────────────────────────────────────────

fn validate_wave_sweep(data: &Data, seconds: f32) -> Vec<TestResult> {
    println!("--- Waves ({seconds:.0}s) ---");
    let mut results = Vec::new();
    let (mut engine, center) = arena(data, 11, ProfileData::default());
    let spawners = [
        engine.add_spawner(center + Vec3::new(60.0, 4.0, 60.0), SpawnerConfig::default()),
        engine.add_spawner(center + Vec3::new(-60.0, 4.0, -60.0), SpawnerConfig { shield_generators: 0, ..SpawnerConfig::default() }),
    ];
    let max_alive = engine.level.max_alive as usize;

    let mut rng = StdRng::seed_from_u64(5);
    let mut over_cap = 0;
    let mut non_finite = 0;
    let mut accounting_errors = 0;
    let mut waves_started = 0;
    let mut attacked = 0;
    let frames = (seconds / FRAME) as usize;

    for frame in 0..frames {
        engine.update(FRAME);

        // The player fights back: one hit on a random agent every second
        if frame % 30 == 0 {
            let agents: Vec<_> = engine
                .world
                .query::<(&Profile, &Health)>()
                .iter()
                .filter(|(_, (_, h))| h.alive)
                .map(|(e, _)| e)
                .collect();
            if !agents.is_empty() {
                let victim = agents[rng.gen_range(0..agents.len())];
                let source = DamageSource { position: center, forward: Vec3::FORWARD };
                engine.apply_damage(victim, rng.gen_range(5.0..60.0), Some(source));
            }
        }

        for event in engine.drain_events() {
            match event {
                GameEvent::WaveStarted { .. } => waves_started += 1,
                GameEvent::DefensiveUnitsSpawned { .. } => attacked += 1,
                _ => {}
            }
        }

        for spawner in &spawners {
            if let Ok(s) = engine.world.get::<&Spawner>(*spawner) {
                if max_alive > 0 && !s.config.ignore_max_alive && s.live.len() > max_alive {
                    over_cap += 1;
                }
            }
        }
        non_finite += engine
            .world
            .query::<&Pose>()
            .iter()
            .filter(|(_, p)| !(p.position.x.is_finite() && p.position.y.is_finite() && p.position.z.is_finite()))
            .count();

        let stats = &engine.ctx.stats;
        if stats.value(ENEMIES_SPAWNED) != engine.agent_count() as i64 + stats.value(ENEMY_KILLS) {
            accounting_errors += 1;
        }
    }

    let spawned = engine.ctx.stats.value(ENEMIES_SPAWNED);
    let kills = engine.ctx.stats.value(ENEMY_KILLS);
    results.push(TestResult::new(
        "waves_spawn_enemies",
        spawned > 0 && waves_started >= 2,
        format!("{waves_started} waves, {spawned} spawned, {kills} killed, {} alive", engine.agent_count()),
    ));
    results.push(TestResult::new(
        "live_cap_respected",
        over_cap == 0,
        format!("{over_cap} frames over the cap of {max_alive}"),
    ));
    results.push(TestResult::new(
        "positions_finite",
        non_finite == 0,
        format!("{non_finite} non-finite positions"),
    ));
    results.push(TestResult::new(
        "spawn_accounting",
        accounting_errors == 0,
        format!("spawned == alive + killed held on all but {accounting_errors} frames"),
    ));
    results.push(TestResult::new(
        "pool_reuses_agents",
        kills == 0 || engine.pool.total_dormant() < kills as usize,
        format!("{} dormant after {kills} kills", engine.pool.total_dormant()),
    ));
    log::info!("{attacked} defensive responses");

    results
}

// ── 3. Nanobot economy ──────────────────────────────────────────────────

/// A player who bleeds health, picks up every drop and always takes the
/// first offer.
struct ScriptedPlayer {
    snapshot: PlayerSnapshot,
}

impl ScriptedPlayer {
    fn new() -> Self {
        Self {
            snapshot: PlayerSnapshot {
                health: Gauge::full(100.0),
                shield: Gauge::full(50.0),
                armour: Gauge::new(0.0, 20.0),
                ..PlayerSnapshot::default()
            },
        }
    }

    fn bleed(&mut self, amount: f32) {
        let health = &mut self.snapshot.health;
        health.current = (health.current - amount).max(1.0);
    }

    /// Pick up a finished build.
    fn receive(&mut self, catalog: &RecipeCatalog, id: &RecipeId) {
        let Some(recipe) = catalog.get(id) else {
            return;
        };
        let s = &mut self.snapshot;
        match &recipe.kind {
            RecipeKind::Health { heal_amount } => s.health.current = (s.health.current + heal_amount).min(s.health.max),
            RecipeKind::Shield { amount } => s.shield.current = (s.shield.current + amount).min(s.shield.max),
            RecipeKind::Armour { amount } => s.armour.current = (s.armour.current + amount).min(s.armour.max),
            RecipeKind::Weapon { weapon, ammo_recipe } => {
                let ammo_type = ammo_recipe.as_ref().and_then(|a| match catalog.get(a).map(|r| &r.kind) {
                    Some(RecipeKind::Ammo { ammo_type, .. }) => Some(ammo_type.clone()),
                    _ => None,
                });
                s.weapons.push(OwnedWeapon { weapon: weapon.clone(), ammo_type });
                s.selected_weapon.get_or_insert(0);
            }
            RecipeKind::Ammo { ammo_type, quantity, max_quantity } => {
                let held = s.ammo.entry(ammo_type.clone()).or_insert(0);
                *held = (*held + quantity).min(*max_quantity);
            }
            _ => {}
        }
    }

    /// Spend ammo on the wielded weapon.
    fn shoot(&mut self, rounds: u32) {
        let Some(ammo_type) = self.snapshot.selected().and_then(|w| w.ammo_type.clone()) else {
            return;
        };
        if let Some(held) = self.snapshot.ammo.get_mut(&ammo_type) {
            *held = held.saturating_sub(rounds);
        }
    }
}

fn validate_economy(data: &Data, seconds: f32) -> Vec<TestResult> {
    println!("--- Nanobots ({seconds:.0}s) ---");
    let mut results = Vec::new();
    let (mut engine, center) = arena(data, 23, ProfileData::default());
    engine.add_spawner(center + Vec3::new(50.0, 4.0, 0.0), SpawnerConfig { shield_generators: 0, ..SpawnerConfig::default() });
    engine.start_session();

    let mut player = ScriptedPlayer::new();
    let mut rng = StdRng::seed_from_u64(9);
    let mut building: Option<RecipeId> = None;
    let mut overlapping_builds = 0;
    let mut builds = 0;
    let mut oversized_offers = 0;
    let mut requested: Vec<RecipeId> = Vec::new();
    let mut received = 0;
    let mut level = engine.ctx.profile.nanobot_level;
    let mut level_regressions = 0;
    let offer_count = engine.nanobots.config.offer_count;
    let frames = (seconds / FRAME) as usize;

    for frame in 0..frames {
        engine.set_player(player.snapshot.clone(), Pose::new(center, Vec3::FORWARD));
        engine.update(FRAME);

        if frame % 30 == 0 {
            player.bleed(rng.gen_range(0.0..8.0));
            player.shoot(rng.gen_range(0..6));
            // kill whatever is closest so drops keep coming
            let nearest = engine
                .world
                .query::<(&Profile, &Health, &Pose)>()
                .iter()
                .filter(|(_, (_, h, _))| h.alive)
                .min_by(|a, b| {
                    let da = a.1 .2.position.distance_squared(&center);
                    let db = b.1 .2.position.distance_squared(&center);
                    da.total_cmp(&db)
                })
                .map(|(e, _)| e);
            if let Some(victim) = nearest {
                engine.apply_damage(victim, 1_000.0, None);
            }
        }

        for event in engine.drain_events() {
            match event {
                GameEvent::BuildStarted { recipe } => {
                    if building.is_some() {
                        overlapping_builds += 1;
                    }
                    building = Some(recipe);
                }
                GameEvent::BuildCompleted { recipe } => {
                    if building.as_ref() == Some(&recipe) {
                        building = None;
                    }
                    builds += 1;
                }
                GameEvent::PickupSpawned { recipe, .. } => player.receive(&engine.ctx.catalog, &recipe),
                GameEvent::ResourcesDropped { amount, .. } => engine.collect_resources(amount),
                GameEvent::OffersPresented(offers) => {
                    if offers.len() > offer_count {
                        oversized_offers += 1;
                    }
                    if let Some(id) = engine.choose_offer(0) {
                        requested.push(id);
                    }
                }
                GameEvent::RecipeReceived { .. } => received += 1,
                GameEvent::NanobotLevelUp { level: new, .. } => {
                    if new <= level {
                        level_regressions += 1;
                    }
                    level = new;
                }
                _ => {}
            }
        }
    }

    let stats = &engine.ctx.stats;
    results.push(TestResult::new(
        "builds_never_overlap",
        overlapping_builds == 0,
        format!("{builds} builds, {overlapping_builds} overlaps"),
    ));
    results.push(TestResult::new(
        "resources_flow",
        stats.value(RESOURCES_COLLECTED) > 0,
        format!(
            "{} collected, {} banked",
            stats.value(RESOURCES_COLLECTED),
            engine.ctx.profile.resources
        ),
    ));
    results.push(TestResult::new(
        "levels_only_rise",
        level_regressions == 0 && stats.value(MAX_NANOBOT_LEVEL) <= engine.ctx.profile.nanobot_level as i64,
        format!("level {}, {level_regressions} regressions", engine.ctx.profile.nanobot_level),
    ));
    results.push(TestResult::new(
        "offers_bounded",
        oversized_offers == 0,
        format!("{} offers taken, none above {offer_count} recipes", requested.len()),
    ));
    // the last request may still be in flight
    results.push(TestResult::new(
        "requests_delivered",
        received + 1 >= requested.len(),
        format!("{received}/{} requested recipes received", requested.len()),
    ));
    results.push(TestResult::new(
        "player_kept_alive",
        player.snapshot.health.current > 0.0,
        format!("player ends on {:.0} health", player.snapshot.health.current),
    ));

    results
}

// ── 4. Snapshot ─────────────────────────────────────────────────────────

fn validate_snapshot(data: &Data) -> Vec<TestResult> {
    println!("--- Snapshot ---");
    let mut results = Vec::new();
    let (mut engine, center) = arena(data, 31, ProfileData::default());
    engine.add_spawner(center + Vec3::new(40.0, 4.0, 40.0), SpawnerConfig::default());
    engine.start_session();
    for _ in 0..(20.0 / FRAME) as usize {
        engine.update(FRAME);
    }
    engine.drain_events();

    let mut buffer = Vec::new();
    if let Err(e) = engine.save(&mut buffer) {
        results.push(TestResult::new("snapshot_save", false, e.to_string()));
        return results;
    }
    let (mut restored, _) = arena(data, 31, ProfileData::default());
    if let Err(e) = restored.load(buffer.as_slice()) {
        results.push(TestResult::new("snapshot_load", false, e.to_string()));
        return results;
    }

    results.push(TestResult::new(
        "snapshot_preserves_agents",
        restored.agent_count() == engine.agent_count() && restored.pool.total_dormant() == engine.pool.total_dormant(),
        format!("{} alive, {} dormant, {} bytes", restored.agent_count(), restored.pool.total_dormant(), buffer.len()),
    ));
    results.push(TestResult::new(
        "snapshot_preserves_progress",
        restored.now() == engine.now()
            && restored.ctx.stats.value(ENEMIES_SPAWNED) == engine.ctx.stats.value(ENEMIES_SPAWNED)
            && restored.nanobots.state == engine.nanobots.state,
        format!("t={:.1}s", restored.now()),
    ));

    restored.set_target(Some(TargetInfo { position: center, body: PLAYER_BODY }));
    for _ in 0..(10.0 / FRAME) as usize {
        restored.update(FRAME);
    }
    results.push(TestResult::new(
        "snapshot_resumes",
        restored.now() > engine.now(),
        format!("resumed to t={:.1}s with {} alive", restored.now(), restored.agent_count()),
    ));

    results
}
