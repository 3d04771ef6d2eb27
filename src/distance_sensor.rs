//! Infrared distance ("ET") sensor.

use crate::config::{DistanceSensorConfig, SensorNode};
use crate::engine::{BodyKind, BodyTag, PhysicsEngine, TraceShape};
use crate::error::{BindingError, EngineError};
use crate::sensor::{ANALOG_MAX, Sensor, SensorBase};
use bevy_math::{Dir3, Ray3d};

/// Linear response: 4095 at contact, 0 at (and beyond) `max_distance`.
pub fn ideal_distance_value(distance: f64, max_distance: f64) -> f64 {
    if distance >= max_distance {
        0.0
    } else {
        f64::from(ANALOG_MAX) - (distance / max_distance * f64::from(ANALOG_MAX)).floor()
    }
}

/// Response fitted to measurements of the physical sensor.
pub fn realistic_distance_value(distance: f64, max_distance: f64) -> f64 {
    if distance >= max_distance {
        1100.0
    } else if distance >= 80.0 {
        345.0
    } else if distance <= 3.0 {
        // Ramps up to the plateau.
        (distance * (2910.0 / 3.0)).floor()
    } else if distance <= 11.2 {
        2910.0
    } else {
        (3240.7 * (distance - 10.0).powf(-0.776)).floor()
    }
}

/// Casts a ray along the sensor's +Z and reports proximity of the nearest hit.
#[derive(Debug)]
pub struct DistanceSensor {
    base: SensorBase,
    config: DistanceSensorConfig,
}

impl DistanceSensor {
    pub fn new(
        engine: &mut dyn PhysicsEngine,
        node: &SensorNode,
        config: DistanceSensorConfig,
    ) -> Result<Self, BindingError> {
        let base = SensorBase::attach(
            engine,
            node,
            TraceShape::Line {
                length: config.max_distance,
            },
        )?;
        Ok(Self { base, config })
    }

    pub fn config(&self) -> &DistanceSensorConfig {
        &self.config
    }

    /// Distance to the nearest qualifying body, if any lies within range.
    fn measure(&self, engine: &mut dyn PhysicsEngine) -> Result<Option<f32>, EngineError> {
        let pose = engine.trace_pose(self.base.trace())?;
        let direction = Dir3::new(pose.forward())
            .map_err(|err| EngineError::Query(format!("degenerate sensor orientation: {err}")))?;
        let ray = Ray3d::new(pose.position, direction);

        let own = self.base.trace();
        let mut accepts = |tag: &BodyTag| {
            tag.body != own
                && matches!(tag.kind, BodyKind::Scene)
                && (tag.has_physics || tag.selected)
        };
        let hit = engine.cast_ray(ray, self.config.max_distance, &mut accepts)?;
        Ok(hit.map(|hit| hit.distance))
    }
}

impl Sensor for DistanceSensor {
    type Output = u16;

    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn get_value(&mut self, engine: &mut dyn PhysicsEngine) -> Result<u16, EngineError> {
        let max_distance = f64::from(self.config.max_distance);
        let distance = self
            .measure(engine)?
            .map_or(f64::INFINITY, f64::from);

        let mut value = if self.base.realistic() {
            realistic_distance_value(distance, max_distance)
        } else {
            ideal_distance_value(distance, max_distance)
        };
        value -= self.base.noise_offset(f64::from(self.config.noise_radius));

        Ok(value.clamp(0.0, f64::from(ANALOG_MAX)) as u16)
    }
}
