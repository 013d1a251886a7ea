//! Vector math for agent poses: positions, facing and rotation.
//!
//! Conventions: `y` is up, `z` is forward, `x` is right. Positive yaw turns
//! right (forward swings toward `+x`), negative pitch about the right axis
//! tilts the nose up.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Anything shorter than this is treated as a degenerate direction.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// 3D vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };
    pub const DOWN: Self = Self { x: 0.0, y: -1.0, z: 0.0 };
    pub const FORWARD: Self = Self { x: 0.0, y: 0.0, z: 1.0 };
    pub const BACK: Self = Self { x: 0.0, y: 0.0, z: -1.0 };
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0, z: 0.0 };
    pub const LEFT: Self = Self { x: -1.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length_squared(&self) -> f32 {
        self.dot(self)
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        (*self - *other).length_squared()
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Unit vector in the same direction, or `None` for degenerate input.
    pub fn try_normalize(&self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > DIRECTION_EPSILON {
            Some(*self * (1.0 / len))
        } else {
            None
        }
    }

    /// Unit vector in the same direction, or zero for degenerate input.
    pub fn normalize(&self) -> Self {
        self.try_normalize().unwrap_or(Self::ZERO)
    }

    /// Projection onto the ground plane.
    pub fn horizontal(&self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    pub fn with_y(&self, y: f32) -> Self {
        Self::new(self.x, y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Right-hand axis for an agent facing `self` with world up.
    pub fn right_of(&self) -> Self {
        Self::UP.cross(self).try_normalize().unwrap_or(Self::RIGHT)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Rotate `v` about `axis` by `degrees` (Rodrigues' formula).
pub fn rotate_about_axis(v: Vec3, axis: Vec3, degrees: f32) -> Vec3 {
    let Some(k) = axis.try_normalize() else {
        return v;
    };
    let (sin, cos) = degrees.to_radians().sin_cos();
    v * cos + k.cross(&v) * sin + k * (k.dot(&v) * (1.0 - cos))
}

/// Turn a facing direction about world up.
pub fn yaw(forward: Vec3, degrees: f32) -> Vec3 {
    rotate_about_axis(forward, Vec3::UP, degrees)
}

/// Tilt a facing direction about its own right axis.
pub fn pitch(forward: Vec3, degrees: f32) -> Vec3 {
    rotate_about_axis(forward, forward.right_of(), degrees)
}

/// Angle between two directions in degrees, 0 when either is degenerate.
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    match (a.try_normalize(), b.try_normalize()) {
        (Some(a), Some(b)) => a.dot(&b).clamp(-1.0, 1.0).acos().to_degrees(),
        _ => 0.0,
    }
}

/// Spherical interpolation between two facing directions.
///
/// `t` is clamped to [0, 1]. The result is always a finite unit vector:
/// a degenerate `to` keeps `from`, a degenerate `from` snaps to `to`, and
/// opposite directions turn about world up.
pub fn slerp_direction(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let Some(to) = to.try_normalize() else {
        return from.try_normalize().unwrap_or(Vec3::FORWARD);
    };
    let Some(from) = from.try_normalize() else {
        return to;
    };
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let cos = from.dot(&to).clamp(-1.0, 1.0);
    let angle = cos.acos();
    if angle < 1e-4 {
        return to;
    }

    let axis = from
        .cross(&to)
        .try_normalize()
        .or_else(|| Vec3::UP.cross(&from).try_normalize().map(|_| Vec3::UP))
        .unwrap_or(Vec3::RIGHT);
    rotate_about_axis(from, axis, angle.to_degrees() * t)
        .try_normalize()
        .unwrap_or(to)
}

/// Uniform random point on the unit sphere surface.
pub fn random_on_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// Uniform random point inside the unit ball.
pub fn random_inside_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    let radius = rng.gen::<f32>().cbrt();
    random_on_unit_sphere(rng) * radius
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box centred on `center` with the given full extents.
    pub fn centered(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Distance along a ray to the first intersection (slab method).
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
            (origin.z, direction.z, self.min.z, self.max.z),
        ];
        for (o, d, lo, hi) in axes {
            if d.abs() < DIRECTION_EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (t0, t1) = {
                let a = (lo - o) * inv;
                let b = (hi - o) * inv;
                if a < b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(&b) < 1e-3
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.dot(&b), 32.0);
    }

    #[test]
    fn test_degenerate_normalize_is_none() {
        assert!(Vec3::ZERO.try_normalize().is_none());
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
        let n = Vec3::new(3.0, 4.0, 0.0).normalize();
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn positive_yaw_turns_right() {
        assert!(close(yaw(Vec3::FORWARD, 90.0), Vec3::RIGHT));
        assert!(close(yaw(Vec3::FORWARD, -90.0), Vec3::LEFT));
    }

    #[test]
    fn negative_pitch_tilts_up() {
        let up_forward = pitch(Vec3::FORWARD, -12.0);
        assert!(up_forward.y > 0.0);
        let down_forward = pitch(Vec3::FORWARD, 12.0);
        assert!(down_forward.y < 0.0);
    }

    #[test]
    fn slerp_moves_partway_and_never_nans() {
        let half = slerp_direction(Vec3::FORWARD, Vec3::RIGHT, 0.5);
        assert!((angle_between(half, Vec3::FORWARD) - 45.0).abs() < 0.1);

        let back = slerp_direction(Vec3::FORWARD, Vec3::BACK, 0.5);
        assert!(back.is_finite());
        assert!((back.length() - 1.0).abs() < 1e-4);

        let kept = slerp_direction(Vec3::FORWARD, Vec3::ZERO, 0.5);
        assert_eq!(kept, Vec3::FORWARD);

        let nan_t = slerp_direction(Vec3::FORWARD, Vec3::RIGHT, f32::NAN);
        assert!(nan_t.is_finite());
    }

    #[test]
    fn random_sphere_points_have_unit_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = random_on_unit_sphere(&mut rng);
            assert!((p.length() - 1.0).abs() < 1e-4);
            assert!(random_inside_unit_sphere(&mut rng).length() <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_ray_box_intersection() {
        let bb = BoundingBox::centered(Vec3::new(0.0, 0.0, 5.0), Vec3::new(2.0, 2.0, 2.0));
        let hit = bb.ray_intersection(Vec3::ZERO, Vec3::FORWARD);
        assert!((hit.unwrap_or(-1.0) - 4.0).abs() < 1e-4);
        assert!(bb.ray_intersection(Vec3::ZERO, Vec3::BACK).is_none());
        assert!(bb.ray_intersection(Vec3::ZERO, Vec3::UP).is_none());
        assert!(bb.contains(&Vec3::new(0.5, 0.5, 5.5)));
    }
}
