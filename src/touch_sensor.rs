//! Contact switch modelled as a small collision-test box.

use crate::config::{SensorNode, TouchSensorConfig};
use crate::engine::{BodyKind, PhysicsEngine, TraceShape};
use crate::error::{BindingError, EngineError};
use crate::sensor::{Sensor, SensorBase};
use bevy_math::primitives::Cuboid;

#[derive(Debug)]
pub struct TouchSensor {
    base: SensorBase,
    config: TouchSensorConfig,
}

impl TouchSensor {
    pub fn new(
        engine: &mut dyn PhysicsEngine,
        node: &SensorNode,
        config: TouchSensorConfig,
    ) -> Result<Self, BindingError> {
        let volume = Cuboid {
            half_size: config.half_extents,
        };
        let base = SensorBase::attach(engine, node, TraceShape::Volume(volume))?;
        Ok(Self { base, config })
    }

    pub fn config(&self) -> &TouchSensorConfig {
        &self.config
    }
}

impl Sensor for TouchSensor {
    type Output = bool;

    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    /// Pressed when the volume overlaps any physics body that is not part of
    /// the robot's own structure.
    fn get_value(&mut self, engine: &mut dyn PhysicsEngine) -> Result<bool, EngineError> {
        let own = self.base.trace();
        let touching = engine.test_intersect(own)?;
        Ok(touching.iter().any(|tag| {
            tag.body != own
                && tag.has_physics
                && !matches!(tag.kind, BodyKind::RobotLink | BodyKind::Trace)
        }))
    }
}
