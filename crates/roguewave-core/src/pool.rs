//! Entity pool: reuses dormant agents instead of spawning fresh entities.

use crate::components::*;
use hecs::{Entity, EntityBuilder, World};
use std::collections::HashMap;
use std::sync::Arc;

/// How an agent came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A previously released entity was reused
    Reused,
    Fresh,
}

/// Dormant agents by prototype name.
#[derive(Debug, Default)]
pub struct EntityPool {
    dormant: HashMap<String, Vec<Entity>>,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an active agent of `profile` at `position`, reusing a dormant one
    /// when available. Every per-life component is reset.
    pub fn spawn(
        &mut self,
        world: &mut World,
        profile: &Arc<EnemyProfile>,
        position: Vec3,
    ) -> (Entity, Origin) {
        let mut builder = agent_bundle(profile, position);
        builder.add(Pooled { prototype: profile.name.clone() });

        let reused = self
            .dormant
            .get_mut(&profile.name)
            .and_then(|list| list.pop())
            .filter(|e| world.contains(*e));

        match reused {
            Some(entity) => {
                let _ = world.remove_one::<Dormant>(entity);
                let _ = world.remove_one::<SpawnedBy>(entity);
                let _ = world.insert(entity, builder.build());
                (entity, Origin::Reused)
            }
            None => (world.spawn(builder.build()), Origin::Fresh),
        }
    }

    /// Put a dead agent to sleep until it is reused.
    pub fn release(&mut self, world: &mut World, entity: Entity) {
        let Ok(prototype) = world.get::<&Pooled>(entity).map(|p| p.prototype.clone()) else {
            let _ = world.despawn(entity);
            return;
        };
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            health.alive = false;
        }
        let _ = world.insert_one(entity, Dormant);
        let list = self.dormant.entry(prototype).or_default();
        if !list.contains(&entity) {
            list.push(entity);
        }
    }

    /// Track an already dormant entity, e.g. one restored from a snapshot.
    pub fn adopt(&mut self, prototype: &str, entity: Entity) {
        let list = self.dormant.entry(prototype.to_owned()).or_default();
        if !list.contains(&entity) {
            list.push(entity);
        }
    }

    pub fn dormant_count(&self, prototype: &str) -> usize {
        self.dormant.get(prototype).map_or(0, Vec::len)
    }

    pub fn total_dormant(&self) -> usize {
        self.dormant.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.dormant.clear();
    }
}

/// Components of a freshly activated agent.
pub fn agent_bundle(profile: &Arc<EnemyProfile>, position: Vec3) -> EntityBuilder {
    let position = profile.steering.clamp_height(position);
    let mut builder = EntityBuilder::new();
    builder
        .add(Pose::new(position, Vec3::FORWARD))
        .add(Motion::default())
        .add(Brain::new(position))
        .add(TargetRange::default())
        .add(Perception::default())
        .add(SightState::default())
        .add(Health::new(profile.health_max.unwrap_or(1.0)))
        .add(Awareness::default())
        .add(ChallengeCache::default())
        .add(SquadMembership::Solo)
        .add(Profile(Arc::clone(profile)));
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Arc<EnemyProfile> {
        Arc::new(EnemyProfile { name: name.into(), ..EnemyProfile::default() })
    }

    #[test]
    fn test_release_then_reuse() {
        let mut world = World::new();
        let mut pool = EntityPool::new();
        let drone = profile("drone");

        let (first, origin) = pool.spawn(&mut world, &drone, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(origin, Origin::Fresh);

        world.get::<&mut Health>(first).unwrap().current = 0.0;
        pool.release(&mut world, first);
        assert_eq!(pool.dormant_count("drone"), 1);
        assert!(world.get::<&Dormant>(first).is_ok());

        let (second, origin) = pool.spawn(&mut world, &drone, Vec3::new(5.0, 2.0, 5.0));
        assert_eq!(origin, Origin::Reused);
        assert_eq!(second, first);
        assert!(world.get::<&Dormant>(second).is_err());
        let health = *world.get::<&Health>(second).unwrap();
        assert!(health.alive);
        assert_eq!(health.current, health.max);
        assert_eq!(world.get::<&Pose>(second).unwrap().position.x, 5.0);
    }

    #[test]
    fn test_prototypes_do_not_mix() {
        let mut world = World::new();
        let mut pool = EntityPool::new();
        let (a, _) = pool.spawn(&mut world, &profile("a"), Vec3::new(0.0, 1.0, 0.0));
        pool.release(&mut world, a);
        let (_, origin) = pool.spawn(&mut world, &profile("b"), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(origin, Origin::Fresh);
        assert_eq!(pool.total_dormant(), 1);
    }

    #[test]
    fn test_unpooled_entities_are_despawned() {
        let mut world = World::new();
        let mut pool = EntityPool::new();
        let e = world.spawn((Health::new(1.0),));
        pool.release(&mut world, e);
        assert!(!world.contains(e));
    }
}
