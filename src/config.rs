//! Robot definitions: which joints and sensors are wired to which ports.
//!
//! Everything here is plain serde data so a scene can ship it as JSON (or any
//! other serde format) next to its geometry.

use crate::engine::Pose;
use crate::error::{BindingError, PortKind};
use crate::motor::{ANALOG_COUNT, DIGITAL_COUNT, MOTOR_COUNT, SERVO_COUNT};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

/// Wiring polarity of a motor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plug {
    #[default]
    Normal,
    Reversed,
}

impl Plug {
    pub fn sign(self) -> f64 {
        match self {
            Plug::Normal => 1.0,
            Plug::Reversed => -1.0,
        }
    }
}

/// Physical properties of a motor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Encoder ticks per output shaft revolution. Default: 2048.
    pub ticks_per_revolution: f64,
    /// Velocity at full duty cycle, in ticks per second. Default: 1500.
    pub velocity_max: f64,
    pub plug: Plug,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            ticks_per_revolution: 2048.0,
            velocity_max: 1500.0,
            plug: Plug::Normal,
        }
    }
}

/// Physical travel of a servo, in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub min_angle: f64,
    pub max_angle: f64,
    /// Fixed offset added to every commanded angle.
    pub twist: f64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_angle: -FRAC_PI_2,
            max_angle: FRAC_PI_2,
            twist: 0.0,
        }
    }
}

/// A time-of-flight style distance sensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceSensorConfig {
    /// Centimeters. Default: 100.
    pub max_distance: f32,
    /// Half-width of the uniform noise band, in reading units.
    pub noise_radius: f32,
}

impl Default for DistanceSensorConfig {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            noise_radius: 160.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSensorConfig {
    pub noise_radius: f32,
}

impl Default for LightSensorConfig {
    fn default() -> Self {
        Self { noise_radius: 10.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchSensorConfig {
    /// Half extents of the collision-test box, in centimeters.
    pub half_extents: Vec3,
}

impl Default for TouchSensorConfig {
    fn default() -> Self {
        Self {
            half_extents: Vec3::splat(0.5),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SensorKind {
    Distance(DistanceSensorConfig),
    Light(LightSensorConfig),
    Touch(TouchSensorConfig),
}

impl SensorKind {
    /// Touch sensors are digital; everything else is analog.
    pub fn port_kind(&self) -> PortKind {
        match self {
            SensorKind::Touch(_) => PortKind::Digital,
            SensorKind::Distance(_) | SensorKind::Light(_) => PortKind::Analog,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotorNode {
    pub name: String,
    pub joint: String,
    pub port: usize,
    #[serde(default)]
    pub config: MotorConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServoNode {
    pub name: String,
    pub joint: String,
    pub port: usize,
    #[serde(default)]
    pub config: ServoConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorNode {
    pub name: String,
    /// Link the sensor is mounted on.
    pub parent_link: String,
    /// Mounting pose relative to the parent link.
    #[serde(default)]
    pub origin: Pose,
    pub port: usize,
    /// Seeds the noise generator. Unseeded sensors draw from entropy.
    #[serde(default)]
    pub noise_seed: Option<u64>,
    pub kind: SensorKind,
}

/// The full wiring of one robot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotDefinition {
    /// Link whose pose is reported as the robot origin.
    pub root_link: String,
    #[serde(default)]
    pub motors: Vec<MotorNode>,
    #[serde(default)]
    pub servos: Vec<ServoNode>,
    #[serde(default)]
    pub sensors: Vec<SensorNode>,
}

fn check_port(kind: PortKind, port: usize) -> Result<(), BindingError> {
    let count = match kind {
        PortKind::Motor => MOTOR_COUNT,
        PortKind::Servo => SERVO_COUNT,
        PortKind::Analog => ANALOG_COUNT,
        PortKind::Digital => DIGITAL_COUNT,
    };
    if port < count {
        Ok(())
    } else {
        Err(BindingError::PortOutOfRange { kind, port, count })
    }
}

fn positive(node: &str, parameter: &'static str, value: f64) -> Result<(), BindingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BindingError::InvalidParameter {
            node: node.to_string(),
            parameter,
            reason: format!("must be positive, got {value}"),
        })
    }
}

impl MotorNode {
    pub fn validate(&self) -> Result<(), BindingError> {
        check_port(PortKind::Motor, self.port)?;
        positive(
            &self.name,
            "ticks_per_revolution",
            self.config.ticks_per_revolution,
        )?;
        positive(&self.name, "velocity_max", self.config.velocity_max)
    }
}

impl ServoNode {
    pub fn validate(&self) -> Result<(), BindingError> {
        check_port(PortKind::Servo, self.port)?;
        let ServoConfig {
            min_angle,
            max_angle,
            twist,
        } = self.config;
        if !twist.is_finite() {
            return Err(BindingError::InvalidParameter {
                node: self.name.clone(),
                parameter: "twist",
                reason: format!("must be finite, got {twist}"),
            });
        }
        if min_angle.is_nan() || max_angle.is_nan() || min_angle > max_angle {
            return Err(BindingError::InvalidParameter {
                node: self.name.clone(),
                parameter: "min_angle",
                reason: format!("{min_angle} exceeds max_angle {max_angle}"),
            });
        }
        Ok(())
    }
}

impl SensorNode {
    pub fn validate(&self) -> Result<(), BindingError> {
        check_port(self.kind.port_kind(), self.port)?;
        match &self.kind {
            SensorKind::Distance(config) => {
                positive(&self.name, "max_distance", f64::from(config.max_distance))
            }
            SensorKind::Touch(config) => {
                let smallest = config.half_extents.min_element();
                positive(&self.name, "half_extents", f64::from(smallest))
            }
            SensorKind::Light(_) => Ok(()),
        }
    }
}

/// Tracks which node claimed each port while a definition is checked or bound.
#[derive(Debug, Default)]
pub(crate) struct PortClaims {
    claimed: HashMap<(PortKind, usize), String>,
}

impl PortClaims {
    /// Fails if another node already holds the port.
    pub(crate) fn check(&self, kind: PortKind, port: usize, name: &str) -> Result<(), BindingError> {
        match self.claimed.get(&(kind, port)) {
            Some(first) => Err(BindingError::DuplicatePort {
                kind,
                port,
                first: first.clone(),
                second: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn claim(
        &mut self,
        kind: PortKind,
        port: usize,
        name: &str,
    ) -> Result<(), BindingError> {
        self.check(kind, port, name)?;
        self.claimed.insert((kind, port), name.to_string());
        Ok(())
    }

    pub(crate) fn release(&mut self, kind: PortKind, port: usize) {
        self.claimed.remove(&(kind, port));
    }
}

impl RobotDefinition {
    /// Checks every node. Stops at the first problem.
    pub fn validate(&self) -> Result<(), BindingError> {
        let mut claims = PortClaims::default();
        for motor in &self.motors {
            motor.validate()?;
            claims.claim(PortKind::Motor, motor.port, &motor.name)?;
        }
        for servo in &self.servos {
            servo.validate()?;
            claims.claim(PortKind::Servo, servo.port, &servo.name)?;
        }
        for sensor in &self.sensors {
            sensor.validate()?;
            claims.claim(sensor.kind.port_kind(), sensor.port, &sensor.name)?;
        }
        Ok(())
    }
}
