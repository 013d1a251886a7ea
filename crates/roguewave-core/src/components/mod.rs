//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod agent;
mod spawner;

pub use agent::*;
pub use spawner::*;

pub use roguewave_logic::challenge::ChallengeCache;
pub use roguewave_logic::geometry::Vec3;
pub use roguewave_logic::sight::SightState;
pub use roguewave_logic::steering::Pose;
