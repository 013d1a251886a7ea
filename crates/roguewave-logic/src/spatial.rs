//! Ray-cast oracle used by steering, sight and destination validation.
//!
//! The core never owns world geometry. It asks a [`SpatialQuery`] for the
//! first hit along a ray and reacts to the answer. [`BoxWorld`] is a small
//! axis-aligned implementation used by tests and the headless harness.

use crate::geometry::{BoundingBox, Vec3};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Bit mask selecting which layers a ray may hit.
pub type LayerMask = u32;

/// Every layer.
pub const ALL_LAYERS: LayerMask = u32::MAX;

/// Identity of a physical body in the spatial world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// What kind of surface a ray struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceTag {
    Obstacle,
    Ground,
    Agent,
}

/// First hit along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub body: BodyId,
    pub tag: SurfaceTag,
}

/// Ray-cast interface onto the world.
pub trait SpatialQuery {
    /// First hit within `max_distance` along `direction` from `origin`,
    /// considering only bodies whose layer is in `mask`.
    fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit>;
}

/// A world with no geometry at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyWorld;

impl SpatialQuery for EmptyWorld {
    fn ray_cast(&self, _: Vec3, _: Vec3, _: f32, _: LayerMask) -> Option<RayHit> {
        None
    }
}

/// Whether anything lies within `radius` of `center`, probed with six
/// axis rays. A center inside a solid body always counts as blocked.
pub fn sphere_blocked(spatial: &dyn SpatialQuery, center: Vec3, radius: f32, mask: LayerMask) -> bool {
    [Vec3::UP, Vec3::DOWN, Vec3::FORWARD, Vec3::BACK, Vec3::RIGHT, Vec3::LEFT]
        .into_iter()
        .any(|dir| spatial.ray_cast(center, dir, radius, mask).is_some())
}

/// One solid box in a [`BoxWorld`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxBody {
    pub id: BodyId,
    pub bounds: BoundingBox,
    pub layer: LayerMask,
    pub tag: SurfaceTag,
}

/// Ground plane plus a list of axis-aligned boxes.
///
/// Counts ray casts so callers can assert that a code path never touched
/// the world.
#[derive(Debug, Default)]
pub struct BoxWorld {
    pub bodies: Vec<BoxBody>,
    /// Height of the ground plane, if any.
    pub ground: Option<f32>,
    pub ground_body: Option<BodyId>,
    pub ground_layer: LayerMask,
    casts: Cell<u64>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// World with a ground plane at `y = height`.
    pub fn with_ground(height: f32) -> Self {
        Self {
            ground: Some(height),
            ground_body: Some(BodyId(0)),
            ground_layer: 1,
            ..Self::default()
        }
    }

    pub fn add_box(&mut self, id: BodyId, bounds: BoundingBox, layer: LayerMask, tag: SurfaceTag) {
        self.bodies.push(BoxBody { id, bounds, layer, tag });
    }

    /// Move an existing body, e.g. to track a target.
    pub fn move_body(&mut self, id: BodyId, center: Vec3) {
        if let Some(body) = self.bodies.iter_mut().find(|b| b.id == id) {
            let size = body.bounds.max - body.bounds.min;
            body.bounds = BoundingBox::centered(center, size);
        }
    }

    pub fn cast_count(&self) -> u64 {
        self.casts.get()
    }

    fn ground_hit(&self, origin: Vec3, dir: Vec3, mask: LayerMask) -> Option<RayHit> {
        let height = self.ground?;
        if mask & self.ground_layer == 0 || dir.y >= 0.0 || origin.y < height {
            return None;
        }
        Some(RayHit {
            distance: (origin.y - height) / -dir.y,
            body: self.ground_body.unwrap_or(BodyId(0)),
            tag: SurfaceTag::Ground,
        })
    }
}

impl SpatialQuery for BoxWorld {
    fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit> {
        self.casts.set(self.casts.get() + 1);
        let dir = direction.try_normalize()?;

        let boxes = self
            .bodies
            .iter()
            .filter(|b| b.layer & mask != 0)
            .filter_map(|b| {
                b.bounds.ray_intersection(origin, dir).map(|distance| RayHit {
                    distance,
                    body: b.id,
                    tag: b.tag,
                })
            });

        boxes
            .chain(self.ground_hit(origin, dir, mask))
            .filter(|hit| hit.distance <= max_distance)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
