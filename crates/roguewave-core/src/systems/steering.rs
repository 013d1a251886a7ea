//! Steering system - moves agents toward their goals

use super::SquadRegistry;
use crate::components::*;
use hecs::{Entity, World};
use roguewave_logic::spatial::{BodyId, SpatialQuery};
use roguewave_logic::steering::{compute_step, SquadContext, SteeringInput, SteeringStep};
use std::collections::HashMap;

/// Advance every living mobile agent one tick. `target_body` is seen
/// through by avoidance probes.
pub fn steering_system(
    world: &mut World,
    squads: &SquadRegistry,
    target_body: Option<BodyId>,
    spatial: &dyn SpatialQuery,
    dt: f32,
) {
    // Squad positions are read from the start of the tick so that update
    // order inside a squad doesn't matter.
    let mut squad_positions: HashMap<SquadId, Vec<(Entity, Vec3)>> = HashMap::new();
    for (entity, (pose, membership, health)) in
        world.query::<(&Pose, &SquadMembership, &Health)>().iter()
    {
        if let (true, Some(id)) = (health.alive, membership.squad()) {
            squad_positions.entry(id).or_default().push((entity, pose.position));
        }
    }

    let mut updates: Vec<(Entity, SteeringStep)> = Vec::with_capacity(256);
    let mut members: Vec<Vec3> = Vec::new();

    for (entity, (pose, motion, brain, membership, profile, health)) in world
        .query::<(&Pose, &Motion, &Brain, &SquadMembership, &Profile, &Health)>()
        .iter()
    {
        if !health.alive || !profile.mobile {
            continue;
        }
        let Some(destination) = brain.goal else {
            continue;
        };

        members.clear();
        if let Some(id) = membership.squad() {
            if squads.contains(id) {
                members.extend(
                    squad_positions
                        .get(&id)
                        .into_iter()
                        .flatten()
                        .filter(|(e, _)| *e != entity)
                        .map(|(_, p)| *p),
                );
            }
        }

        let input = SteeringInput {
            pose: *pose,
            destination,
            speed_multiplier: brain.speed_multiplier,
            speed: motion.speed,
            dt,
            squad: SquadContext {
                members: &members,
                is_leader: !matches!(membership, SquadMembership::Follows(_)),
            },
            ignore_body: target_body,
        };
        updates.push((entity, compute_step(&profile.steering, &input, spatial)));
    }

    for (entity, step) in updates {
        if let Ok(mut pose) = world.get::<&mut Pose>(entity) {
            *pose = step.pose;
        }
        if let Ok(mut motion) = world.get::<&mut Motion>(entity) {
            motion.speed = step.speed;
            motion.arrived = step.arrived;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent_bundle;
    use roguewave_logic::spatial::EmptyWorld;
    use std::sync::Arc;

    fn agent(world: &mut World, at: Vec3, goal: Vec3) -> Entity {
        let e = world.spawn(agent_bundle(&Arc::new(EnemyProfile::default()), at).build());
        world.get::<&mut Brain>(e).unwrap().goal = Some(goal);
        e
    }

    #[test]
    fn test_agents_move_toward_goal() {
        let mut world = World::new();
        let squads = SquadRegistry::new();
        let e = agent(&mut world, Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 5.0, 50.0));

        for _ in 0..60 {
            steering_system(&mut world, &squads, None, &EmptyWorld, 1.0 / 30.0);
        }
        let pose = *world.get::<&Pose>(e).unwrap();
        assert!(pose.position.z > 5.0);
        let motion = *world.get::<&Motion>(e).unwrap();
        assert!(motion.speed >= 0.0 && motion.speed <= 6.0);
        assert!(!motion.arrived);
    }

    #[test]
    fn test_speed_stays_bounded_for_a_squad() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let goal = Vec3::new(20.0, 5.0, 20.0);
        let leader = agent(&mut world, Vec3::new(0.0, 5.0, 0.0), goal);
        let id = squads.form(&mut world, leader);
        for i in 0..4 {
            let f = agent(&mut world, Vec3::new(i as f32 * 0.5, 5.0, 1.0), goal);
            squads.join(&mut world, id, f);
        }

        for _ in 0..300 {
            steering_system(&mut world, &squads, None, &EmptyWorld, 1.0 / 30.0);
            for (_, motion) in world.query::<&Motion>().iter() {
                assert!(motion.speed >= 0.0 && motion.speed <= 6.0);
            }
        }
        for (_, pose) in world.query::<&Pose>().iter() {
            assert!(pose.position.is_finite());
        }
    }

    #[test]
    fn test_dead_agents_do_not_move() {
        let mut world = World::new();
        let squads = SquadRegistry::new();
        let start = Vec3::new(0.0, 5.0, 0.0);
        let e = agent(&mut world, start, Vec3::new(0.0, 5.0, 50.0));
        world.get::<&mut Health>(e).unwrap().alive = false;
        steering_system(&mut world, &squads, None, &EmptyWorld, 0.1);
        assert_eq!(world.get::<&Pose>(e).unwrap().position, start);
    }
}
