//! Systems - logic that operates on components

mod awareness;
mod brain;
mod combat;
mod nanobots;
mod sensing;
mod spawning;
mod squad;
mod steering;

pub use awareness::*;
pub use brain::*;
pub use combat::*;
pub use nanobots::*;
pub use sensing::*;
pub use spawning::*;
pub use squad::*;
pub use steering::*;
