// Shared fixtures for the integration tests.
#![allow(dead_code)]

use bevy_math::Ray3d;
use glam::{Quat, Vec3};
use std::collections::{HashMap, HashSet};
use wallaby_sim::{
    BodyId, BodyKind, BodyTag, EngineError, JointId, LinkId, PhysicsEngine, Pose, RayHit,
    SceneLight, TraceShape,
};

pub const CHASSIS: LinkId = 1;
pub const LEFT_WHEEL: JointId = 10;
pub const RIGHT_WHEEL: JointId = 11;
pub const ARM: JointId = 12;

/// A sphere the mock ray caster can hit.
#[derive(Clone, Copy, Debug)]
pub struct Obstacle {
    pub center: Vec3,
    pub radius: f32,
    pub tag: BodyTag,
}

#[derive(Clone, Copy, Debug)]
pub struct Trace {
    pub parent: LinkId,
    pub local: Pose,
    pub shape: TraceShape,
    pub visible: bool,
}

/// A scripted scene: joints report whatever angle the test sets, rays hit
/// spheres, touch volumes report a fixed contact list.
#[derive(Debug, Default)]
pub struct MockEngine {
    pub time: f64,
    pub joints: HashMap<String, JointId>,
    pub links: HashMap<String, LinkId>,
    pub angles: HashMap<JointId, f64>,
    pub motor_velocities: HashMap<JointId, f64>,
    pub servo_targets: HashMap<JointId, (f64, f64)>,
    pub link_poses: HashMap<LinkId, Pose>,
    pub lights: Vec<SceneLight>,
    pub obstacles: Vec<Obstacle>,
    pub contacts: Vec<BodyTag>,
    pub traces: HashMap<BodyId, Trace>,
    pub disposed: Vec<BodyId>,
    pub failing_joints: HashSet<JointId>,
    pub refuse_traces: bool,
    pub rays_cast: usize,
    next_body: BodyId,
}

impl MockEngine {
    /// A chassis link with two wheel motors and an arm servo.
    pub fn new() -> Self {
        let mut engine = Self {
            next_body: 100,
            ..Self::default()
        };
        engine.links.insert("chassis".into(), CHASSIS);
        engine.link_poses.insert(CHASSIS, Pose::IDENTITY);
        for (name, joint) in [
            ("left_wheel", LEFT_WHEEL),
            ("right_wheel", RIGHT_WHEEL),
            ("arm", ARM),
        ] {
            engine.joints.insert(name.into(), joint);
            engine.angles.insert(joint, 0.0);
        }
        engine
    }

    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds;
    }

    pub fn set_angle(&mut self, joint: JointId, angle: f64) {
        self.angles.insert(joint, angle);
    }

    pub fn velocity(&self, joint: JointId) -> f64 {
        self.motor_velocities.get(&joint).copied().unwrap_or(0.0)
    }

    pub fn new_body(&mut self) -> BodyId {
        self.next_body += 1;
        self.next_body
    }

    /// Adds a scene sphere and returns its tag.
    pub fn add_obstacle(&mut self, center: Vec3, radius: f32, has_physics: bool) -> BodyTag {
        let tag = BodyTag {
            body: self.new_body(),
            kind: BodyKind::Scene,
            has_physics,
            selected: false,
        };
        self.obstacles.push(Obstacle {
            center,
            radius,
            tag,
        });
        tag
    }

    pub fn only_trace(&self) -> (BodyId, Trace) {
        assert_eq!(self.traces.len(), 1, "expected exactly one trace");
        let (id, trace) = self.traces.iter().next().unwrap();
        (*id, *trace)
    }
}

fn ray_sphere(ray: &Ray3d, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(*ray.direction);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let near = -b - root;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + root;
    (far >= 0.0).then_some(far)
}

impl PhysicsEngine for MockEngine {
    fn resolve_joint(&self, name: &str) -> Option<JointId> {
        self.joints.get(name).copied()
    }

    fn resolve_link(&self, name: &str) -> Option<LinkId> {
        self.links.get(name).copied()
    }

    fn joint_angle(&mut self, joint: JointId) -> Result<f64, EngineError> {
        if self.failing_joints.contains(&joint) {
            return Err(EngineError::UnknownJoint(joint));
        }
        self.angles
            .get(&joint)
            .copied()
            .ok_or(EngineError::UnknownJoint(joint))
    }

    fn set_joint_motor_velocity(&mut self, joint: JointId, velocity: f64) -> Result<(), EngineError> {
        self.motor_velocities.insert(joint, velocity);
        Ok(())
    }

    fn set_servo_target(&mut self, joint: JointId, angle: f64, rate: f64) -> Result<(), EngineError> {
        self.servo_targets.insert(joint, (angle, rate));
        Ok(())
    }

    fn cast_ray(
        &mut self,
        ray: Ray3d,
        max_distance: f32,
        filter: &mut dyn FnMut(&BodyTag) -> bool,
    ) -> Result<Option<RayHit>, EngineError> {
        self.rays_cast += 1;
        let mut nearest: Option<RayHit> = None;
        for obstacle in &self.obstacles {
            if !filter(&obstacle.tag) {
                continue;
            }
            let Some(distance) = ray_sphere(&ray, obstacle.center, obstacle.radius) else {
                continue;
            };
            if distance > max_distance {
                continue;
            }
            if nearest.is_none_or(|hit| distance < hit.distance) {
                nearest = Some(RayHit {
                    distance,
                    body: obstacle.tag,
                });
            }
        }
        Ok(nearest)
    }

    fn test_intersect(&mut self, volume: BodyId) -> Result<Vec<BodyTag>, EngineError> {
        if !self.traces.contains_key(&volume) {
            return Err(EngineError::UnknownTrace(volume));
        }
        Ok(self.contacts.clone())
    }

    fn lights(&self) -> Vec<SceneLight> {
        self.lights.clone()
    }

    fn link_pose(&self, link: LinkId) -> Result<Pose, EngineError> {
        self.link_poses
            .get(&link)
            .copied()
            .ok_or(EngineError::UnknownLink(link))
    }

    fn create_trace(
        &mut self,
        parent: LinkId,
        local: Pose,
        shape: TraceShape,
    ) -> Result<BodyId, EngineError> {
        if self.refuse_traces {
            return Err(EngineError::Query("trace geometry unsupported".into()));
        }
        let id = self.new_body();
        self.traces.insert(
            id,
            Trace {
                parent,
                local,
                shape,
                visible: false,
            },
        );
        Ok(id)
    }

    fn trace_pose(&self, trace: BodyId) -> Result<Pose, EngineError> {
        let trace = self
            .traces
            .get(&trace)
            .ok_or(EngineError::UnknownTrace(trace))?;
        Ok(self.link_pose(trace.parent)?.transform(&trace.local))
    }

    fn set_trace_visible(&mut self, trace: BodyId, visible: bool) {
        if let Some(trace) = self.traces.get_mut(&trace) {
            trace.visible = visible;
        }
    }

    fn dispose_trace(&mut self, trace: BodyId) {
        self.traces.remove(&trace);
        self.disposed.push(trace);
    }

    fn now(&self) -> f64 {
        self.time
    }
}

/// A sensor pose on the chassis, looking along world +Z from the origin.
pub fn forward_mount() -> Pose {
    Pose::new(Vec3::ZERO, Quat::IDENTITY)
}
