//! Rogue Wave Core - Enemy AI and Nanobot Economy Simulation
//!
//! An ECS-based simulation of the combat arena: waves of enemies that wander,
//! spot the player, coordinate in squads and close to attack range, and the
//! player's nanobots, which spend collected resources on builds and level up
//! to offer new recipes.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Enemy agents, spawners, shield generators
//! - **Components**: Pure data attached to entities (Pose, Brain, Health, etc.)
//! - **Systems**: Free functions that query and update components each tick
//!
//! Pure decision logic (steering, sight, destination search, recipes, offers,
//! the build waterfall) lives in `roguewave-logic`; this crate wires it to
//! the world, the task scheduler and the [`context::GameContext`].
//!
//! # Example
//!
//! ```rust,no_run
//! use roguewave_core::prelude::*;
//! use roguewave_core::config::EngineConfig;
//! use roguewave_logic::spatial::BoxWorld;
//!
//! let mut engine = SimulationEngine::new(EngineConfig::default(), BoxWorld::with_ground(0.0));
//! engine.start_session();
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{event:?}");
//!     }
//! }
//! ```

pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod pool;
pub mod scheduler;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::context::GameContext;
    pub use crate::engine::SimulationEngine;
    pub use crate::events::GameEvent;
}
