//! Frame-throttled line-of-sight tests.
//!
//! A real ray cast happens at most once every 7 to 17 frames per agent; the
//! random stride keeps large crowds from testing on the same frame. Between
//! tests the cached answer is returned unchanged.

use crate::geometry::Vec3;
use crate::spatial::{BodyId, LayerMask, SpatialQuery, ALL_LAYERS};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Rays aim this far above the target origin.
pub const AIM_HEIGHT: f32 = 0.8;
/// Frames between two real tests, drawn per test.
pub const SIGHT_TEST_STRIDE: Range<u64> = 7..18;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SightConfig {
    /// When false the agent attacks without needing to see the target.
    pub require_line_of_sight: bool,
    pub view_distance: f32,
    pub sensor_mask: LayerMask,
}

impl Default for SightConfig {
    fn default() -> Self {
        Self {
            require_line_of_sight: true,
            view_distance: 30.0,
            sensor_mask: ALL_LAYERS,
        }
    }
}

/// The thing agents look for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub position: Vec3,
    pub body: BodyId,
}

impl TargetInfo {
    pub fn aim_point(&self) -> Vec3 {
        self.position + Vec3::UP * AIM_HEIGHT
    }
}

/// Per-agent sight cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SightState {
    /// Frames up to and including this one reuse `last_result`.
    pub next_test_frame: u64,
    pub last_result: bool,
    pub last_known_target_position: Vec3,
}

/// Answer of one [`SightState::can_see`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SightReading {
    pub visible: bool,
    /// True when this call produced a fresh result rather than the cache.
    pub tested: bool,
}

impl SightReading {
    const BLIND: Self = Self { visible: false, tested: false };
}

impl SightState {
    /// Can the agent see `target` from `sensor`?
    ///
    /// `distance` is the agent's cached distance to the target; anything
    /// beyond the view distance is rejected without a ray cast.
    #[allow(clippy::too_many_arguments)]
    pub fn can_see(
        &mut self,
        frame: u64,
        sensor: Vec3,
        target: Option<&TargetInfo>,
        distance: f32,
        config: &SightConfig,
        world: &dyn SpatialQuery,
        rng: &mut impl Rng,
    ) -> SightReading {
        let Some(target) = target else {
            return SightReading::BLIND;
        };

        if self.next_test_frame >= frame {
            return SightReading {
                visible: self.last_result,
                tested: false,
            };
        }
        self.next_test_frame = frame + rng.gen_range(SIGHT_TEST_STRIDE);

        self.last_result = distance <= config.view_distance
            && world
                .ray_cast(
                    sensor,
                    target.aim_point() - sensor,
                    config.view_distance,
                    config.sensor_mask,
                )
                .is_some_and(|hit| hit.body == target.body);

        SightReading {
            visible: self.last_result,
            tested: true,
        }
    }

    /// Accept a sighting reported by a squad member.
    ///
    /// The leader adopts the member's test window so it does not re-test
    /// before the member would.
    pub fn inform(&mut self, target_position: Vec3, next_test_frame: u64) {
        self.last_known_target_position = target_position;
        self.last_result = true;
        self.next_test_frame = next_test_frame;
    }
}
