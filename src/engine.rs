//! The physics collaborator the simulation layer drives.
//!
//! The scene owns the rigid bodies, joints and lights; this crate only sees
//! them through [`PhysicsEngine`]. Lengths crossing this boundary are in
//! centimeters and angles in radians.

use crate::error::EngineError;
use bevy_math::Ray3d;
use bevy_math::primitives::Cuboid;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A motorized or servo hinge joint.
pub type JointId = u32;

/// Any body known to the engine: robot links, scene objects, sensor traces.
pub type BodyId = u32;

/// A robot link. Links are bodies.
pub type LinkId = BodyId;

/// A world- or link-relative rigid transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Composes `local` (expressed in this frame) into this frame's parent space.
    pub fn transform(&self, local: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * local.position,
            rotation: self.rotation * local.rotation,
        }
    }

    /// The frame's local +Z axis.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// What kind of scene geometry a body is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    /// Ordinary scene object.
    Scene,
    /// Structural link of a robot.
    RobotLink,
    /// Invisible collision proxy of a robot.
    Collider,
    /// Debug geometry owned by a sensor.
    Trace,
}

/// Metadata the engine attaches to a body returned from a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyTag {
    pub body: BodyId,
    pub kind: BodyKind,
    /// The body takes part in the physics simulation.
    pub has_physics: bool,
    /// The body is currently selected in the editor.
    pub selected: bool,
}

/// The nearest body along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Centimeters from the ray origin.
    pub distance: f32,
    pub body: BodyTag,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Uniform light from every direction.
    Ambient,
    Point,
    /// Cone of full angle `angle` radians around the light's direction.
    Spot { angle: f32 },
    Directional,
}

/// A light as reported by the scene.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneLight {
    pub kind: LightKind,
    pub enabled: bool,
    pub intensity: f32,
    pub position: Vec3,
    /// Unit vector the light points along. Unused for ambient and point lights.
    pub direction: Vec3,
}

/// Debug geometry a sensor asks the engine to create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TraceShape {
    /// A segment from the origin along local +Z.
    Line { length: f32 },
    /// A small marker sphere.
    Marker { radius: f32 },
    /// A box, also used as a collision-test volume.
    Volume(Cuboid),
}

/// Everything the control loop and sensors need from the physics engine.
///
/// All calls are synchronous from the caller's perspective.
pub trait PhysicsEngine {
    fn resolve_joint(&self, name: &str) -> Option<JointId>;

    fn resolve_link(&self, name: &str) -> Option<LinkId>;

    /// Current hinge angle in `(-π, π]`.
    fn joint_angle(&mut self, joint: JointId) -> Result<f64, EngineError>;

    /// Drives a motorized hinge at `velocity` rad/s.
    fn set_joint_motor_velocity(&mut self, joint: JointId, velocity: f64)
    -> Result<(), EngineError>;

    /// Moves a servo hinge toward `angle` at `rate` rad/s.
    fn set_servo_target(&mut self, joint: JointId, angle: f64, rate: f64)
    -> Result<(), EngineError>;

    /// Finds the nearest body within `max_distance` along `ray` that `filter` accepts.
    fn cast_ray(
        &mut self,
        ray: Ray3d,
        max_distance: f32,
        filter: &mut dyn FnMut(&BodyTag) -> bool,
    ) -> Result<Option<RayHit>, EngineError>;

    /// Every body intersecting the volume trace `volume`.
    fn test_intersect(&mut self, volume: BodyId) -> Result<Vec<BodyTag>, EngineError>;

    fn lights(&self) -> Vec<SceneLight>;

    /// World pose of a link.
    fn link_pose(&self, link: LinkId) -> Result<Pose, EngineError>;

    /// Creates debug geometry attached to `parent` at `local`. Traces start hidden.
    fn create_trace(
        &mut self,
        parent: LinkId,
        local: Pose,
        shape: TraceShape,
    ) -> Result<BodyId, EngineError>;

    /// World pose of a trace.
    fn trace_pose(&self, trace: BodyId) -> Result<Pose, EngineError>;

    fn set_trace_visible(&mut self, trace: BodyId, visible: bool);

    fn dispose_trace(&mut self, trace: BodyId);

    /// Monotonic seconds.
    fn now(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn transform_applies_parent_rotation() {
        let parent = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));
        let local = Pose::new(Vec3::new(0.0, 0.0, 2.0), Quat::IDENTITY);
        let world = parent.transform(&local);
        assert!((world.position - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
        assert!((world.forward() - Vec3::X).length() < 1e-5);
    }
}
