//! Damage reactions and death side effects for enemy agents.
//!
//! Death is always triggered from outside (the host reports damage); these
//! functions only react. Returning the agent to the pool and removing it
//! from its squad and spawner is the engine's job.

use crate::components::*;
use crate::context::{GameStats, ENEMY_KILLS};
use crate::events::{EventQueue, GameEvent};
use hecs::{Entity, World};
use rand::Rng;
use roguewave_logic::geometry::random_inside_unit_sphere;

/// Where a hit came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageSource {
    pub position: Vec3,
    pub forward: Vec3,
}

/// Apply damage to any entity with [`Health`].
pub fn damage_entity(world: &mut World, entity: Entity, amount: f32) -> Option<HealthChange> {
    let mut health = world.get::<&mut Health>(entity).ok()?;
    Some(health.damage(amount))
}

/// True when a hit is big enough to trigger defensive spawns.
pub fn triggers_defensive_spawn(config: &DefensiveSpawnConfig, change: &HealthChange) -> bool {
    change.old - change.new >= config.threshold
}

/// Prototype and position of each defensive unit to spawn.
///
/// Units appear around the attacker (or around the agent itself), pushed
/// along the attacker's facing, scattered inside a sphere of
/// `config.distance` and lifted one unit above the anchor.
pub fn defensive_spawns(
    config: &DefensiveSpawnConfig,
    own_position: Vec3,
    source: Option<&DamageSource>,
    rng: &mut impl Rng,
) -> Vec<(String, Vec3)> {
    if config.prototypes.is_empty() {
        log::error!("defensive spawn configured without prototypes, skipping");
        return Vec::new();
    }
    let anchor = match source {
        Some(s) if config.around_attacker => s.position,
        _ => own_position,
    };

    (0..config.count)
        .map(|_| {
            let prototype = config.prototypes[rng.gen_range(0..config.prototypes.len())].clone();
            let mut position = anchor;
            if let Some(s) = source {
                position += s.forward * config.distance;
            }
            position += random_inside_unit_sphere(rng) * config.distance;
            (prototype, position.with_y(anchor.y + 1.0))
        })
        .collect()
}

/// Fire every death side effect of `entity`: loot, effects, audio, the kill
/// stat. Returns the challenge rating of the dead agent, or `None` if it is
/// not an agent.
pub fn agent_death(
    world: &mut World,
    entity: Entity,
    stats: &mut GameStats,
    events: &mut EventQueue,
    rng: &mut impl Rng,
) -> Option<i32> {
    let (pose, profile, awareness, cache) = world
        .query_one_mut::<(&Pose, &Profile, &mut Awareness, &mut ChallengeCache)>(entity)
        .ok()?;
    let position = pose.position;
    let death = &profile.death;

    if rng.gen::<f32>() < death.drop_chance {
        events.push(GameEvent::ResourcesDropped {
            position: position.with_y(0.0),
            amount: death.resources,
        });
    }

    let effect_at = position + death.effect_offset;
    events.push(GameEvent::DeathEffect { position: effect_at });
    if let Some(explosion) = &death.explosion {
        events.push(GameEvent::DeathExplosion {
            position: effect_at,
            radius: explosion.radius,
            damage: explosion.damage,
            force: explosion.force,
        });
    }
    if !death.clips.is_empty() {
        let clip = death.clips[rng.gen_range(0..death.clips.len())].clone();
        events.push(GameEvent::PlayOneShot { clip, position: Some(position) });
    }
    if awareness.drone_playing {
        awareness.drone_playing = false;
        events.push(GameEvent::StopLooping { entity });
    }

    let challenge_rating = cache.get_or_compute(&profile.challenge_inputs());
    events.push(GameEvent::EnemyDied { entity, position, challenge_rating });
    stats.increment(ENEMY_KILLS);
    log::debug!("{} died at {:?} (challenge {})", profile.name, position, challenge_rating);
    Some(challenge_rating)
}
