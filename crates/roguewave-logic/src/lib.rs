//! Pure game logic for Rogue Wave.
//!
//! Everything here is independent of the ECS and of any engine: functions
//! take plain data (plus a [`spatial::SpatialQuery`] oracle where the world
//! must be probed) and return results, so each piece is unit-testable on
//! its own.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Recipe registry with duplicate detection and per-run state |
//! | [`challenge`] | Enemy challenge rating and its memoised cache |
//! | [`curve`] | Piecewise-linear curves (level thresholds, difficulty) |
//! | [`destination`] | Attack and wander goal search with a shared fallback policy |
//! | [`geometry`] | Vec3, rotations, slerp, bounding boxes |
//! | [`offers`] | Weighted level-up offers with a reserved weapon slot |
//! | [`priority`] | The 11-step nanobot build waterfall |
//! | [`recipe`] | Recipe data, categories, player snapshot and predicates |
//! | [`run_recipes`] | Per-run recipe lists and the category dispatch table |
//! | [`sight`] | Frame-throttled line-of-sight tests |
//! | [`spatial`] | Ray-cast interface and an axis-aligned box world |
//! | [`steering`] | Obstacle avoidance, separation and height control |

pub mod catalog;
pub mod challenge;
pub mod curve;
pub mod destination;
pub mod geometry;
pub mod offers;
pub mod priority;
pub mod recipe;
pub mod run_recipes;
pub mod sight;
pub mod spatial;
pub mod steering;
