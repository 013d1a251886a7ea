//! Destination system - the enemy movement objective state machine
//!
//! Each tick, for every living mobile agent:
//! - A recharging agent heads home and ignores everything else until it
//!   arrives.
//! - With no target the agent wanders.
//! - Otherwise the destination is re-evaluated when the update timer is due,
//!   when the squad can see the target, or on arrival. Agents that should
//!   attack close to their optimal distance; agents under orders keep the
//!   ordered point; agents within seek distance chase the live or last known
//!   target position; anything further away recharges or wanders.

use crate::components::*;
use hecs::{Entity, World};
use rand::Rng;
use roguewave_logic::destination::{attack_position, wander_position, MapBounds};
use roguewave_logic::sight::TargetInfo;
use roguewave_logic::spatial::{SpatialQuery, ALL_LAYERS};

/// Speed multiplier while following a direct order
pub const UNDER_ORDERS_SPEED: f32 = 1.5;

/// World access shared by every destination search in one tick.
pub struct Navigation<'a> {
    pub bounds: &'a MapBounds,
    pub spatial: &'a dyn SpatialQuery,
    pub now: f32,
}

pub fn destination_system(
    world: &mut World,
    target: Option<&TargetInfo>,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) {
    for (_, (brain, sight, motion, perception, range, profile, health)) in world.query_mut::<(
        &mut Brain,
        &mut SightState,
        &Motion,
        &Perception,
        &TargetRange,
        &Profile,
        &Health,
    )>() {
        if !health.alive {
            continue;
        }
        if !profile.mobile {
            brain.state = if should_attack(brain, profile, perception) {
                AgentState::Attacking
            } else {
                AgentState::Wander
            };
            continue;
        }
        update_objective(brain, sight, motion, perception, range, profile, target, nav, rng);
    }
}

/// Order an agent to move to and attack near `position`. Returns false if
/// `entity` is not a living agent.
pub fn request_attack(
    world: &mut World,
    entity: Entity,
    position: Vec3,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) -> bool {
    let Ok((brain, profile, health)) =
        world.query_one_mut::<(&mut Brain, &Profile, &Health)>(entity)
    else {
        return false;
    };
    if !health.alive {
        return false;
    }
    brain.goal = Some(search_attack_goal(position, profile, nav, rng));
    brain.next_destination_change = nav.now + profile.seek.destination_update_frequency;
    brain.under_orders = true;
    brain.state = AgentState::UnderOrders;
    brain.speed_multiplier = UNDER_ORDERS_SPEED;
    true
}

fn should_attack(brain: &Brain, profile: &EnemyProfile, perception: &Perception) -> bool {
    !brain.recharging && (!profile.sight.require_line_of_sight || perception.can_see)
}

#[allow(clippy::too_many_arguments)]
fn update_objective(
    brain: &mut Brain,
    sight: &mut SightState,
    motion: &Motion,
    perception: &Perception,
    range: &TargetRange,
    profile: &EnemyProfile,
    target: Option<&TargetInfo>,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) {
    if brain.recharging {
        if motion.arrived {
            brain.recharging = false;
        } else {
            brain.state = AgentState::Recharging;
            brain.speed_multiplier = 1.0;
            return;
        }
    }

    let due = nav.now > brain.next_destination_change;

    let Some(target) = target else {
        if due || motion.arrived || brain.goal.is_none() {
            wander(brain, profile, nav, rng);
        }
        brain.state = AgentState::Wander;
        brain.speed_multiplier = 1.0;
        return;
    };

    if brain.under_orders && motion.arrived {
        brain.under_orders = false;
    }

    if due || perception.squad_can_see || motion.arrived {
        update_destination(brain, sight, perception, range, profile, target, nav, rng);
    }

    if brain.under_orders {
        brain.state = AgentState::UnderOrders;
        brain.speed_multiplier = UNDER_ORDERS_SPEED;
    } else {
        brain.speed_multiplier = 1.0;
    }
}

#[allow(clippy::too_many_arguments)]
fn update_destination(
    brain: &mut Brain,
    sight: &mut SightState,
    perception: &Perception,
    range: &TargetRange,
    profile: &EnemyProfile,
    target: &TargetInfo,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) {
    if should_attack(brain, profile, perception) {
        brain.goal = Some(attack_goal(brain, target.position, profile, nav, rng));
        brain.state = AgentState::Attacking;
        return;
    }
    if brain.under_orders {
        return;
    }

    if range.distance < profile.seek.seek_distance {
        let toward = if perception.squad_can_see {
            sight.last_known_target_position = target.position;
            target.position
        } else {
            sight.last_known_target_position
        };
        brain.goal = Some(attack_goal(brain, toward, profile, nav, rng));
        brain.state = AgentState::Seeking;
    } else if profile.seek.return_to_spawner {
        brain.recharging = true;
        brain.goal = Some(brain.spawn_position);
        brain.state = AgentState::Recharging;
    } else {
        wander(brain, profile, nav, rng);
        brain.state = AgentState::Wander;
    }
}

/// A point near `target_position` at the agent's optimal distance. A goal
/// chosen by this search less than one update period ago is kept.
fn attack_goal(
    brain: &mut Brain,
    target_position: Vec3,
    profile: &EnemyProfile,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) -> Vec3 {
    let chasing = matches!(
        brain.state,
        AgentState::Attacking | AgentState::Seeking | AgentState::UnderOrders
    );
    if let Some(goal) = brain.goal.filter(|_| chasing && nav.now <= brain.next_destination_change) {
        return goal;
    }
    brain.next_destination_change = nav.now + profile.seek.destination_update_frequency;
    search_attack_goal(target_position, profile, nav, rng)
}

fn search_attack_goal(
    target_position: Vec3,
    profile: &EnemyProfile,
    nav: &Navigation<'_>,
    rng: &mut impl Rng,
) -> Vec3 {
    let outcome = attack_position(
        target_position,
        profile.seek.optimal_distance,
        nav.bounds,
        nav.spatial,
        ALL_LAYERS,
        rng,
    );
    if outcome.is_fallback() {
        log::warn!("{} unable to find an attack position, heading for the target", profile.name);
    }
    outcome.point()
}

fn wander(brain: &mut Brain, profile: &EnemyProfile, nav: &Navigation<'_>, rng: &mut impl Rng) {
    brain.recharging = false;
    brain.next_destination_change = nav.now + profile.seek.destination_update_frequency;
    let height = (profile.steering.minimum_height, profile.steering.maximum_height);
    let outcome = wander_position(
        nav.bounds,
        height,
        brain.spawn_position,
        nav.spatial,
        ALL_LAYERS,
        rng,
    );
    brain.goal = Some(outcome.point());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent_bundle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use roguewave_logic::spatial::{BodyId, EmptyWorld};
    use std::sync::Arc;

    const BOUNDS: MapBounds = MapBounds { min_x: 0.0, max_x: 100.0, min_z: 0.0, max_z: 100.0 };

    fn nav(now: f32) -> Navigation<'static> {
        Navigation { bounds: &BOUNDS, spatial: &EmptyWorld, now }
    }

    fn agent(world: &mut World, profile: EnemyProfile, at: Vec3) -> Entity {
        world.spawn(agent_bundle(&Arc::new(profile), at).build())
    }

    fn target_at(position: Vec3) -> TargetInfo {
        TargetInfo { position, body: BodyId(1) }
    }

    fn set_range(world: &mut World, e: Entity, distance: f32) {
        world.get::<&mut TargetRange>(e).unwrap().distance = distance;
    }

    #[test]
    fn test_visible_target_is_attacked() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(4);
        let e = agent(&mut world, EnemyProfile::default(), Vec3::new(50.0, 5.0, 50.0));
        *world.get::<&mut Perception>(e).unwrap() = Perception { can_see: true, squad_can_see: true };
        let target = target_at(Vec3::new(60.0, 1.0, 60.0));

        destination_system(&mut world, Some(&target), &nav(1.0), &mut rng);

        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert_eq!(brain.state, AgentState::Attacking);
        let goal = brain.goal.expect("goal set");
        assert!(goal.distance(&target.position) <= 0.2 + 1e-4);
        assert_eq!(brain.next_destination_change, 3.0);
    }

    #[test]
    fn test_attack_goal_is_throttled() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(5);
        let e = agent(&mut world, EnemyProfile::default(), Vec3::new(50.0, 5.0, 50.0));
        *world.get::<&mut Perception>(e).unwrap() = Perception { can_see: true, squad_can_see: true };

        destination_system(&mut world, Some(&target_at(Vec3::new(60.0, 1.0, 60.0))), &nav(1.0), &mut rng);
        let first = world.get::<&Brain>(e).unwrap().goal;

        // Target moved, but the update period has not elapsed
        destination_system(&mut world, Some(&target_at(Vec3::new(20.0, 1.0, 20.0))), &nav(1.5), &mut rng);
        assert_eq!(world.get::<&Brain>(e).unwrap().goal, first);

        destination_system(&mut world, Some(&target_at(Vec3::new(20.0, 1.0, 20.0))), &nav(3.5), &mut rng);
        let goal = world.get::<&Brain>(e).unwrap().goal.unwrap();
        assert!(goal.distance(&Vec3::new(20.0, 1.0, 20.0)) < 1.0);
    }

    #[test]
    fn test_out_of_seek_range_recharges() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(6);
        let mut profile = EnemyProfile::default();
        profile.seek.return_to_spawner = true;
        let spawn = Vec3::new(10.0, 5.0, 10.0);
        let e = agent(&mut world, profile, spawn);
        set_range(&mut world, e, 80.0);

        destination_system(&mut world, Some(&target_at(Vec3::new(90.0, 1.0, 90.0))), &nav(1.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert!(brain.recharging);
        assert_eq!(brain.state, AgentState::Recharging);
        assert_eq!(brain.goal, Some(spawn));

        // Still recharging while not arrived, even if the target is in view
        *world.get::<&mut Perception>(e).unwrap() = Perception { can_see: true, squad_can_see: true };
        destination_system(&mut world, Some(&target_at(Vec3::new(90.0, 1.0, 90.0))), &nav(10.0), &mut rng);
        assert_eq!(world.get::<&Brain>(e).unwrap().goal, Some(spawn));

        world.get::<&mut Motion>(e).unwrap().arrived = true;
        destination_system(&mut world, Some(&target_at(Vec3::new(90.0, 1.0, 90.0))), &nav(11.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert!(!brain.recharging);
        assert_eq!(brain.state, AgentState::Attacking);
    }

    #[test]
    fn test_seeking_uses_last_known_position() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(7);
        let e = agent(&mut world, EnemyProfile::default(), Vec3::new(50.0, 5.0, 50.0));
        set_range(&mut world, e, 10.0);
        let last_known = Vec3::new(40.0, 1.0, 40.0);
        world.get::<&mut SightState>(e).unwrap().last_known_target_position = last_known;

        destination_system(&mut world, Some(&target_at(Vec3::new(55.0, 1.0, 55.0))), &nav(1.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert_eq!(brain.state, AgentState::Seeking);
        assert!(brain.goal.unwrap().distance(&last_known) <= 0.2 + 1e-4);
    }

    #[test]
    fn test_no_target_wanders_within_bounds() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(8);
        let e = agent(&mut world, EnemyProfile::default(), Vec3::new(50.0, 5.0, 50.0));

        destination_system(&mut world, None, &nav(1.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert_eq!(brain.state, AgentState::Wander);
        let goal = brain.goal.expect("wander goal");
        assert!(BOUNDS.contains(&goal));
        assert!(goal.y >= 0.5 && goal.y <= 75.0);
    }

    #[test]
    fn test_request_attack_puts_agent_under_orders() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(9);
        let e = agent(&mut world, EnemyProfile::default(), Vec3::new(50.0, 5.0, 50.0));
        let ordered = Vec3::new(30.0, 2.0, 30.0);
        set_range(&mut world, e, 80.0);

        assert!(request_attack(&mut world, e, ordered, &nav(1.0), &mut rng));
        destination_system(&mut world, Some(&target_at(Vec3::new(90.0, 1.0, 90.0))), &nav(5.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert!(brain.under_orders);
        assert_eq!(brain.state, AgentState::UnderOrders);
        assert_eq!(brain.speed_multiplier, UNDER_ORDERS_SPEED);
        assert!(brain.goal.unwrap().distance(&ordered) <= 0.2 + 1e-4);

        world.get::<&mut Motion>(e).unwrap().arrived = true;
        destination_system(&mut world, Some(&target_at(Vec3::new(90.0, 1.0, 90.0))), &nav(6.0), &mut rng);
        let brain = (*world.get::<&Brain>(e).unwrap()).clone();
        assert!(!brain.under_orders);
        assert_eq!(brain.speed_multiplier, 1.0);
    }

    #[test]
    fn test_request_attack_on_missing_entity() {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!request_attack(&mut world, Entity::DANGLING, Vec3::ZERO, &nav(0.0), &mut rng));
    }
}
