//! Omnidirectional light sensor.
//!
//! Every enabled scene light contributes to a running sum: ambient lights a
//! flat calibrated amount, the others a distance-dependent amount provided
//! nothing with a physics body sits between light and sensor and the light is
//! aimed at the sensor. The reading is inverted, so brighter means lower.

use crate::config::{LightSensorConfig, SensorNode};
use crate::engine::{BodyTag, LightKind, PhysicsEngine, SceneLight, TraceShape};
use crate::error::{BindingError, EngineError};
use crate::sensor::{ANALOG_MAX, Sensor, SensorBase};
use bevy_math::{Dir3, Ray3d};
use glam::Vec3;
use std::f32::consts::FRAC_PI_2;

/// Contribution of a unit-intensity ambient light.
pub const AMBIENT_LIGHT_VALUE: f64 = 4095.0 - 3645.0;

const TRACE_RADIUS: f32 = 1.0;

/// Calibrated contribution of a unit-intensity light `cm` centimeters away.
pub fn light_value(cm: f64) -> f64 {
    if cm < 0.0 {
        return 0.0;
    }
    4095.0 - 19.4 - 0.678 * cm + 0.058 * cm * cm - 5.89e-4 * cm * cm * cm
}

/// Whether a directional or spot light points at a target `offset` away from it.
fn aimed_at(light: &SceneLight, offset: Vec3) -> bool {
    let limit = match light.kind {
        LightKind::Directional => FRAC_PI_2,
        LightKind::Spot { angle } => angle / 2.0,
        LightKind::Ambient | LightKind::Point => return true,
    };
    let (Some(direction), Some(toward)) = (light.direction.try_normalize(), offset.try_normalize())
    else {
        return true;
    };
    direction.dot(toward).clamp(-1.0, 1.0).acos() <= limit
}

#[derive(Debug)]
pub struct LightSensor {
    base: SensorBase,
    config: LightSensorConfig,
}

impl LightSensor {
    pub fn new(
        engine: &mut dyn PhysicsEngine,
        node: &SensorNode,
        config: LightSensorConfig,
    ) -> Result<Self, BindingError> {
        let base = SensorBase::attach(
            engine,
            node,
            TraceShape::Marker {
                radius: TRACE_RADIUS,
            },
        )?;
        Ok(Self { base, config })
    }

    pub fn config(&self) -> &LightSensorConfig {
        &self.config
    }

    fn occluded(
        &self,
        engine: &mut dyn PhysicsEngine,
        position: Vec3,
        to_light: Vec3,
    ) -> Result<bool, EngineError> {
        let distance = to_light.length();
        let Ok(direction) = Dir3::new(to_light) else {
            return Ok(false);
        };
        let own = self.base.trace();
        let mut blocks = |tag: &BodyTag| tag.body != own && tag.has_physics;
        let hit = engine.cast_ray(Ray3d::new(position, direction), distance, &mut blocks)?;
        Ok(hit.is_some())
    }
}

impl Sensor for LightSensor {
    type Output = u16;

    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn get_value(&mut self, engine: &mut dyn PhysicsEngine) -> Result<u16, EngineError> {
        let position = engine.trace_pose(self.base.trace())?.position;

        let mut sum = 0.0;
        for light in engine.lights() {
            if !light.enabled {
                continue;
            }
            let intensity = f64::from(light.intensity);
            if light.kind == LightKind::Ambient {
                sum += intensity * AMBIENT_LIGHT_VALUE;
                continue;
            }

            let offset = position - light.position;
            if self.occluded(engine, position, -offset)? || !aimed_at(&light, offset) {
                continue;
            }
            sum += intensity * light_value(f64::from(offset.length()));
        }

        sum -= self.base.noise_offset(f64::from(self.config.noise_radius));

        let max = f64::from(ANALOG_MAX);
        Ok((max - sum.clamp(0.0, max)) as u16)
    }
}
