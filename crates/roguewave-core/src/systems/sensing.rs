//! Sensing systems - target distance cache and squad-aware sight

use super::SquadRegistry;
use crate::components::*;
use hecs::{Entity, World};
use rand::Rng;
use roguewave_logic::sight::TargetInfo;
use roguewave_logic::spatial::SpatialQuery;

/// Refresh each agent's cached distance to the target. Every agent
/// re-measures at its own random sub-second interval.
pub fn target_distance_system(
    world: &mut World,
    target: Option<&TargetInfo>,
    now: f32,
    rng: &mut impl Rng,
) {
    for (_, (pose, range, health)) in world.query_mut::<(&Pose, &mut TargetRange, &Health)>() {
        if !health.alive || now < range.next_check {
            continue;
        }
        range.distance = target.map_or(f32::INFINITY, |t| pose.position.distance(&t.position));
        range.next_check = now + rng.gen::<f32>();
    }
}

/// Run throttled sight tests, then resolve what each squad can see.
///
/// Leaders and solo agents test first so that a follower's sighting
/// reported to its leader this frame survives until the leader's next
/// test window.
pub fn sight_system(
    world: &mut World,
    squads: &SquadRegistry,
    target: Option<&TargetInfo>,
    spatial: &dyn SpatialQuery,
    frame: u64,
    rng: &mut impl Rng,
) {
    let mut agents: Vec<(Entity, SquadMembership, Vec3, f32, Profile)> = world
        .query::<(&Pose, &TargetRange, &SquadMembership, &Health, &Profile)>()
        .iter()
        .filter(|(_, (_, _, _, health, _))| health.alive)
        .map(|(e, (pose, range, membership, _, profile))| {
            let sensor = pose.position + Vec3::UP * profile.steering.sensor_height;
            (e, *membership, sensor, range.distance, profile.clone())
        })
        .collect();
    agents.sort_by_key(|(_, membership, ..)| matches!(membership, SquadMembership::Follows(_)));

    for (entity, membership, sensor, distance, profile) in &agents {
        let (reading, next_frame) = {
            let Ok(mut sight) = world.get::<&mut SightState>(*entity) else {
                continue;
            };
            let reading =
                sight.can_see(frame, *sensor, target, *distance, &profile.sight, spatial, rng);
            if reading.visible {
                if let Some(t) = target {
                    sight.last_known_target_position = t.position;
                }
            }
            (reading, sight.next_test_frame)
        };

        if !(reading.tested && reading.visible) {
            continue;
        }
        let (Some(leader), Some(t)) = (squads.leader_of(*membership), target) else {
            continue;
        };
        if leader == *entity {
            continue;
        }
        if let Ok(mut leader_sight) = world.get::<&mut SightState>(leader) {
            leader_sight.inform(t.position, next_frame);
        }
    }

    let mut perceptions = Vec::with_capacity(agents.len());
    for (entity, membership, ..) in &agents {
        let own = target.is_some() && sees(world, *entity);
        let leader_sees = match squads.leader_of(*membership) {
            Some(leader) if leader != *entity && alive(world, leader) => sees(world, leader),
            _ => false,
        };
        let squad = target.is_some() && (leader_sees || own);
        perceptions.push((*entity, Perception { can_see: own, squad_can_see: squad }));
    }
    for (entity, perception) in perceptions {
        if let Ok(mut p) = world.get::<&mut Perception>(entity) {
            *p = perception;
        }
    }
}

fn sees(world: &World, entity: Entity) -> bool {
    world.get::<&SightState>(entity).map_or(false, |s| s.last_result)
}

fn alive(world: &World, entity: Entity) -> bool {
    world.get::<&Health>(entity).map_or(false, |h| h.alive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent_bundle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use roguewave_logic::spatial::{BodyId, BoxWorld, SurfaceTag};
    use roguewave_logic::geometry::BoundingBox;
    use std::sync::Arc;

    fn target_world(at: Vec3) -> BoxWorld {
        let mut world = BoxWorld::new();
        world.add_box(
            BodyId(42),
            BoundingBox::centered(at + Vec3::UP * 0.8, Vec3::new(1.0, 2.0, 1.0)),
            1,
            SurfaceTag::Agent,
        );
        world
    }

    fn spawn(world: &mut World, at: Vec3) -> Entity {
        let profile = Arc::new(EnemyProfile::default());
        world.spawn(agent_bundle(&profile, at).build())
    }

    #[test]
    fn test_distance_cache_resets_without_target() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(3);
        let e = spawn(&mut world, Vec3::new(0.0, 1.0, 0.0));
        let target = TargetInfo { position: Vec3::new(0.0, 1.0, 10.0), body: BodyId(42) };

        target_distance_system(&mut world, Some(&target), 0.0, &mut rng);
        assert!((world.get::<&TargetRange>(e).unwrap().distance - 10.0).abs() < 1e-4);

        world.get::<&mut TargetRange>(e).unwrap().next_check = 0.0;
        target_distance_system(&mut world, None, 0.0, &mut rng);
        assert!(world.get::<&TargetRange>(e).unwrap().distance.is_infinite());
    }

    #[test]
    fn test_follower_sighting_informs_leader() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let mut rng = StdRng::seed_from_u64(9);
        let target_pos = Vec3::new(0.0, 1.0, 10.0);
        let spatial = target_world(target_pos);
        let target = TargetInfo { position: target_pos, body: BodyId(42) };

        // Leader is out of view range, follower is close
        let leader = spawn(&mut world, Vec3::new(0.0, 1.0, -40.0));
        let follower = spawn(&mut world, Vec3::new(0.0, 1.0, 0.0));
        let id = squads.form(&mut world, leader);
        squads.join(&mut world, id, follower);

        target_distance_system(&mut world, Some(&target), 0.0, &mut rng);
        sight_system(&mut world, &squads, Some(&target), &spatial, 1, &mut rng);

        let leader_sight = world.get::<&SightState>(leader).unwrap().clone();
        let follower_sight = world.get::<&SightState>(follower).unwrap().clone();
        assert!(follower_sight.last_result);
        assert!(leader_sight.last_result);
        assert_eq!(leader_sight.last_known_target_position, target_pos);
        assert_eq!(leader_sight.next_test_frame, follower_sight.next_test_frame);

        let perception = *world.get::<&Perception>(leader).unwrap();
        assert!(perception.squad_can_see);
        assert!(world.get::<&Perception>(follower).unwrap().squad_can_see);
    }

    #[test]
    fn test_no_target_means_blind() {
        let mut world = World::new();
        let squads = SquadRegistry::new();
        let mut rng = StdRng::seed_from_u64(1);
        let e = spawn(&mut world, Vec3::new(0.0, 1.0, 0.0));
        sight_system(&mut world, &squads, None, &BoxWorld::new(), 1, &mut rng);
        assert_eq!(*world.get::<&Perception>(e).unwrap(), Perception::default());
    }
}
