//! Squad registry - membership by lookup, never by ownership

use crate::components::{Health, Pose, SquadId, SquadMembership, Vec3};
use hecs::{Entity, World};
use std::collections::BTreeMap;

/// One squad: an optional leader plus followers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Squad {
    pub leader: Option<Entity>,
    pub followers: Vec<Entity>,
}

impl Squad {
    fn is_empty(&self) -> bool {
        self.leader.is_none() && self.followers.is_empty()
    }
}

/// All live squads. Agents carry a [`SquadMembership`] naming their squad;
/// everything else is looked up here.
#[derive(Debug, Default)]
pub struct SquadRegistry {
    squads: BTreeMap<SquadId, Squad>,
    next_id: u32,
}

impl SquadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new squad led by `leader`.
    pub fn form(&mut self, world: &mut World, leader: Entity) -> SquadId {
        self.leave(world, leader);
        self.next_id += 1;
        let id = SquadId(self.next_id);
        self.squads.insert(id, Squad { leader: Some(leader), followers: Vec::new() });
        set_membership(world, leader, SquadMembership::Leads(id));
        log::debug!("squad {} formed by {:?}", id.0, leader);
        id
    }

    /// Add `member` as a follower. Returns false for an unknown squad.
    pub fn join(&mut self, world: &mut World, id: SquadId, member: Entity) -> bool {
        if !self.squads.contains_key(&id) {
            return false;
        }
        self.leave(world, member);
        let Some(squad) = self.squads.get_mut(&id) else {
            return false;
        };
        squad.followers.push(member);
        set_membership(world, member, SquadMembership::Follows(id));
        true
    }

    /// Drop `entity` from whatever squad it is in. Empty squads disband.
    pub fn leave(&mut self, world: &mut World, entity: Entity) {
        let membership = world
            .get::<&SquadMembership>(entity)
            .map(|m| *m)
            .unwrap_or_default();
        let Some(id) = membership.squad() else {
            return;
        };
        if let Some(squad) = self.squads.get_mut(&id) {
            if squad.leader == Some(entity) {
                squad.leader = None;
            }
            squad.followers.retain(|e| *e != entity);
            if squad.is_empty() {
                self.squads.remove(&id);
            }
        }
        set_membership(world, entity, SquadMembership::Solo);
    }

    pub fn contains(&self, id: SquadId) -> bool {
        self.squads.contains_key(&id)
    }

    pub fn leader(&self, id: SquadId) -> Option<Entity> {
        self.squads.get(&id).and_then(|s| s.leader)
    }

    /// Leader first, then followers in joining order.
    pub fn members(&self, id: SquadId) -> Vec<Entity> {
        self.squads
            .get(&id)
            .map(|s| s.leader.iter().chain(s.followers.iter()).copied().collect())
            .unwrap_or_default()
    }

    /// Positions of every living member except `exclude`.
    pub fn member_positions(&self, world: &World, id: SquadId, exclude: Entity) -> Vec<Vec3> {
        self.members(id)
            .into_iter()
            .filter(|e| *e != exclude)
            .filter(|e| world.get::<&Health>(*e).map_or(false, |h| h.alive))
            .filter_map(|e| world.get::<&Pose>(e).ok().map(|p| p.position))
            .collect()
    }

    /// The leader an agent defers to, if it follows one.
    pub fn leader_of(&self, membership: SquadMembership) -> Option<Entity> {
        match membership {
            SquadMembership::Follows(id) => self.leader(id),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SquadId, &Squad)> {
        self.squads.iter().map(|(id, squad)| (*id, squad))
    }

    /// Rebuild a registry from saved squads. Memberships on the agents are
    /// expected to be restored alongside.
    pub fn restore(squads: impl IntoIterator<Item = (SquadId, Squad)>) -> Self {
        let squads: BTreeMap<SquadId, Squad> =
            squads.into_iter().filter(|(_, squad)| !squad.is_empty()).collect();
        let next_id = squads.keys().map(|id| id.0).max().unwrap_or(0);
        Self { squads, next_id }
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    pub fn clear(&mut self) {
        self.squads.clear();
    }
}

fn set_membership(world: &mut World, entity: Entity, membership: SquadMembership) {
    if let Ok(current) = world.query_one_mut::<&mut SquadMembership>(entity) {
        *current = membership;
        return;
    }
    let _ = world.insert_one(entity, membership);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(world: &mut World, x: f32) -> Entity {
        world.spawn((
            Pose::new(Vec3::new(x, 1.0, 0.0), Vec3::FORWARD),
            Health::new(10.0),
            SquadMembership::Solo,
        ))
    }

    #[test]
    fn test_form_and_join() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let leader = agent(&mut world, 0.0);
        let a = agent(&mut world, 1.0);
        let b = agent(&mut world, 2.0);

        let id = squads.form(&mut world, leader);
        assert!(squads.join(&mut world, id, a));
        assert!(squads.join(&mut world, id, b));

        assert_eq!(squads.leader(id), Some(leader));
        assert_eq!(squads.members(id), vec![leader, a, b]);
        assert_eq!(*world.get::<&SquadMembership>(a).unwrap(), SquadMembership::Follows(id));
        assert_eq!(squads.leader_of(SquadMembership::Follows(id)), Some(leader));
        assert_eq!(squads.member_positions(&world, id, a).len(), 2);
    }

    #[test]
    fn test_join_unknown_squad_fails() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let a = agent(&mut world, 0.0);
        assert!(!squads.join(&mut world, SquadId(99), a));
        assert_eq!(*world.get::<&SquadMembership>(a).unwrap(), SquadMembership::Solo);
    }

    #[test]
    fn test_leaving_disbands_empty_squads() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let leader = agent(&mut world, 0.0);
        let follower = agent(&mut world, 1.0);
        let id = squads.form(&mut world, leader);
        squads.join(&mut world, id, follower);

        squads.leave(&mut world, leader);
        assert!(squads.contains(id));
        assert_eq!(squads.leader(id), None);
        assert_eq!(squads.leader_of(SquadMembership::Follows(id)), None);

        squads.leave(&mut world, follower);
        assert!(squads.is_empty());
        assert_eq!(*world.get::<&SquadMembership>(follower).unwrap(), SquadMembership::Solo);
    }

    #[test]
    fn test_dead_members_have_no_position() {
        let mut world = World::new();
        let mut squads = SquadRegistry::new();
        let leader = agent(&mut world, 0.0);
        let follower = agent(&mut world, 1.0);
        let id = squads.form(&mut world, leader);
        squads.join(&mut world, id, follower);
        world.get::<&mut Health>(follower).unwrap().alive = false;
        assert!(squads.member_positions(&world, id, leader).is_empty());
    }
}
