//! Obstacle-avoiding, height-aware steering for flying enemies.
//!
//! One call to [`compute_step`] advances a single agent by one tick. The
//! horizontal heading and the vertical offset are solved independently:
//! three forward probes decide the yaw, three pitched probes decide the climb.

use crate::geometry::{pitch, slerp_direction, yaw, Vec3};
use crate::spatial::{BodyId, LayerMask, RayHit, SpatialQuery, SurfaceTag, ALL_LAYERS};
use serde::{Deserialize, Serialize};

/// Vertical band inside which an agent stops chasing its goal height.
pub const HEIGHT_DEAD_ZONE: f32 = 0.2;
/// Obstacles closer than this force a crawl.
pub const CRAWL_DISTANCE: f32 = 1.0;
/// Fraction of max speed allowed while crawling.
pub const CRAWL_FACTOR: f32 = 0.1;
/// Pitch of the above/below forward height probes, in degrees.
pub const HEIGHT_PROBE_PITCH: f32 = 12.0;

const FORWARD_TURN: f32 = 90.0;
const SIDE_TURN: f32 = 45.0;
const CLIMB_ABOVE: f32 = -45.0;
const CLIMB_BELOW: f32 = 45.0;
const CLIMB_GROUND: f32 = 60.0;
const MAX_VERTICAL_ANGLE: f32 = 90.0;

/// Movement tuning for one enemy type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub min_speed: f32,
    pub max_speed: f32,
    /// Speed gained (or lost while arriving) per second.
    pub acceleration: f32,
    /// Slerp rate toward the desired heading, per second.
    pub rotation_speed: f32,
    pub minimum_height: f32,
    pub maximum_height: f32,
    pub obstacle_avoidance_distance: f32,
    pub arrival_distance: f32,
    /// Squad members closer than this push each other apart.
    pub separation_distance: f32,
    /// Height of the sensor above the agent origin.
    pub sensor_height: f32,
    pub sensor_mask: LayerMask,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            min_speed: 4.0,
            max_speed: 6.0,
            acceleration: 10.0,
            rotation_speed: 1.0,
            minimum_height: 0.5,
            maximum_height: 75.0,
            obstacle_avoidance_distance: 2.0,
            arrival_distance: 1.5,
            separation_distance: 10.0,
            sensor_height: 0.0,
            sensor_mask: ALL_LAYERS,
        }
    }
}

impl SteeringConfig {
    /// Max speed, never negative.
    pub fn top_speed(&self) -> f32 {
        self.max_speed.max(0.0)
    }

    /// Yaw offset of the side avoidance probes, in degrees.
    pub fn side_probe_angle(&self) -> f32 {
        (self.obstacle_avoidance_distance * 10.0).min(90.0)
    }

    /// Clamp a goal point into the flyable height band.
    pub fn clamp_height(&self, point: Vec3) -> Vec3 {
        let lo = self.minimum_height.min(self.maximum_height);
        point.with_y(point.y.clamp(lo, self.maximum_height.max(lo)))
    }
}

/// Position and horizontal heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::FORWARD)
    }
}

/// Squad data visible to one agent's steering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquadContext<'a> {
    /// Positions of other members of the same squad.
    pub members: &'a [Vec3],
    /// Leaders set the pace and ignore separation.
    pub is_leader: bool,
}

/// Everything needed for one steering tick.
#[derive(Debug, Clone, Copy)]
pub struct SteeringInput<'a> {
    pub pose: Pose,
    pub destination: Vec3,
    pub speed_multiplier: f32,
    pub speed: f32,
    pub dt: f32,
    pub squad: SquadContext<'a>,
    /// Body the avoidance probes should see through (usually the target).
    pub ignore_body: Option<BodyId>,
}

/// Result of one steering tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringStep {
    pub pose: Pose,
    pub speed: f32,
    pub arrived: bool,
}

/// Outcome of the three horizontal probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Avoidance {
    /// Yaw in degrees, positive turns right. Zero when nothing was hit.
    pub turn: f32,
    /// Distance to the obstacle that caused the turn.
    pub distance: Option<f32>,
}

impl Avoidance {
    pub const CLEAR: Self = Self { turn: 0.0, distance: None };
}

fn probe(
    world: &dyn SpatialQuery,
    origin: Vec3,
    direction: Vec3,
    length: f32,
    mask: LayerMask,
    ignore: Option<BodyId>,
) -> Option<RayHit> {
    world
        .ray_cast(origin, direction, length, mask)
        .filter(|hit| Some(hit.body) != ignore)
}

fn sensor_origin(config: &SteeringConfig, pose: &Pose) -> Vec3 {
    pose.position + Vec3::UP * config.sensor_height
}

/// Forward, left and right probes. The first probe that hits decides.
pub fn avoidance(
    config: &SteeringConfig,
    pose: &Pose,
    world: &dyn SpatialQuery,
    ignore: Option<BodyId>,
) -> Avoidance {
    let range = config.obstacle_avoidance_distance;
    if range <= 0.0 {
        return Avoidance::CLEAR;
    }
    let origin = sensor_origin(config, pose);
    let side = config.side_probe_angle();

    let probes = [
        (pose.forward, FORWARD_TURN),
        (yaw(pose.forward, -side), SIDE_TURN),
        (yaw(pose.forward, side), -SIDE_TURN),
    ];
    for (direction, turn) in probes {
        if let Some(hit) = probe(world, origin, direction, range, config.sensor_mask, ignore) {
            let scale = (1.0 - hit.distance / range).clamp(0.0, 1.0);
            return Avoidance {
                turn: turn * scale,
                distance: Some(hit.distance),
            };
        }
    }
    Avoidance::CLEAR
}

/// Sum of unit pushes away from every member closer than `threshold`.
pub fn separation(position: Vec3, members: &[Vec3], threshold: f32) -> Vec3 {
    let limit = threshold * threshold;
    members
        .iter()
        .map(|m| position - *m)
        .filter(|away| away.length_squared() < limit)
        .filter_map(|away| away.try_normalize())
        .fold(Vec3::ZERO, |acc, push| acc + push)
}

/// Vertical change for this tick.
///
/// With an obstacle above, ahead-below or beneath, the accumulated climb
/// angle sets a vertical speed of `|angle| / 90 * max_speed * multiplier`.
/// Opposing probes that cancel out climb at half that rate. Otherwise the
/// agent drifts toward the goal height at its current speed, outside a
/// small dead zone.
pub fn height_adjustment(
    config: &SteeringConfig,
    pose: &Pose,
    goal_height: f32,
    speed: f32,
    multiplier: f32,
    dt: f32,
    world: &dyn SpatialQuery,
) -> f32 {
    let origin = sensor_origin(config, pose);
    let range = config.obstacle_avoidance_distance.max(0.0);
    let mask = config.sensor_mask;

    let mut angle = 0.0;
    let mut blocked = false;

    if range > 0.0 {
        let above = pitch(pose.forward, -HEIGHT_PROBE_PITCH);
        if probe(world, origin, above, range, mask, None).is_some() {
            angle += CLIMB_ABOVE;
            blocked = true;
        }

        let below = pitch(pose.forward, HEIGHT_PROBE_PITCH);
        if probe(world, origin, below, range, mask, None)
            .is_some_and(|hit| hit.tag != SurfaceTag::Ground)
        {
            angle += CLIMB_BELOW;
            blocked = true;
        }
    }

    let ground_range = config.minimum_height + config.sensor_height;
    if ground_range > 0.0 && probe(world, origin, Vec3::DOWN, ground_range, mask, None).is_some() {
        angle += CLIMB_GROUND;
        blocked = true;
    }

    if blocked {
        let angle: f32 = angle.clamp(-MAX_VERTICAL_ANGLE, MAX_VERTICAL_ANGLE);
        let rate = config.top_speed() * multiplier * dt;
        if angle == 0.0 {
            return rate * 0.5;
        }
        return rate * angle / MAX_VERTICAL_ANGLE;
    }

    let diff = goal_height - pose.position.y;
    if diff.abs() <= HEIGHT_DEAD_ZONE {
        return 0.0;
    }
    diff.signum() * diff.abs().min(speed * dt)
}

/// Advance one agent by one tick.
pub fn compute_step(
    config: &SteeringConfig,
    input: &SteeringInput<'_>,
    world: &dyn SpatialQuery,
) -> SteeringStep {
    let max_speed = config.top_speed();
    let multiplier = if input.speed_multiplier.is_finite() {
        input.speed_multiplier.max(0.0)
    } else {
        0.0
    };
    let dt = input.dt.max(0.0);
    let mut pose = input.pose;
    if pose.forward.horizontal().try_normalize().is_none() {
        pose.forward = Vec3::FORWARD;
    }
    pose.forward = pose.forward.horizontal().normalize();

    let destination = config.clamp_height(input.destination);
    let to_goal = (destination - pose.position).horizontal();
    let arrived = to_goal.length() <= config.arrival_distance;

    let mut speed = if input.speed.is_finite() { input.speed } else { 0.0 };
    if arrived {
        speed -= config.acceleration * dt;
    } else {
        speed = (speed + config.acceleration * dt).max(config.min_speed);
    }
    speed = speed.clamp(0.0, max_speed);

    // Heading
    let goal_dir = to_goal.try_normalize();
    let ahead = goal_dir.map_or(true, |dir| pose.forward.dot(&dir) > 0.0);
    let avoid = if ahead {
        avoidance(config, &pose, world, input.ignore_body)
    } else {
        Avoidance::CLEAR
    };

    let desired = if avoid.distance.is_some() {
        if avoid.distance.is_some_and(|d| d < CRAWL_DISTANCE) {
            speed = speed.min(max_speed * CRAWL_FACTOR);
        }
        yaw(pose.forward, avoid.turn)
    } else {
        let mut heading = goal_dir.unwrap_or(Vec3::ZERO);
        if !input.squad.is_leader {
            heading += separation(
                pose.position,
                input.squad.members,
                config.separation_distance,
            )
            .horizontal();
        }
        heading
    };

    let turned = slerp_direction(pose.forward, desired, config.rotation_speed * dt);
    pose.forward = turned.horizontal().try_normalize().unwrap_or(pose.forward);

    // Translation
    if speed > 0.0 {
        pose.position += pose.forward * (speed * multiplier * dt);
    }
    let climb = height_adjustment(
        config,
        &pose,
        destination.y,
        speed,
        multiplier,
        dt,
        world,
    );
    pose.position.y += climb;
    pose.position = config.clamp_height(pose.position);

    SteeringStep { pose, speed, arrived }
}
