//! Binds a robot definition to a physics scene and runs it once per frame.
//!
//! [`RobotBinding::tick`] reads the robot through [`Readable`], measures the
//! scene, drives the engine's joints and returns the [`WriteCommand`] batch the
//! caller must apply before the next tick.

use crate::command::WriteCommand;
use crate::config::{
    MotorConfig, MotorNode, PortClaims, RobotDefinition, SensorKind, SensorNode, ServoConfig,
    ServoNode,
};
use crate::control::{MotorController, MotorStep, servo_angle, servo_rate};
use crate::distance_sensor::DistanceSensor;
use crate::engine::{JointId, LinkId, PhysicsEngine, Pose};
use crate::error::{BindingError, EngineError, PortKind, TickError};
use crate::light_sensor::LightSensor;
use crate::motor::{ANALOG_COUNT, DIGITAL_COUNT, MOTOR_COUNT, SERVO_CENTER, SERVO_COUNT};
use crate::robot::Readable;
use crate::sensor::{ReadCache, Sensor};
use crate::touch_sensor::TouchSensor;
use tracing::{info, trace, warn};

/// Output of one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickOut {
    /// World pose of the robot's root link.
    pub origin: Pose,
    /// Mutations to apply, in order.
    pub write_commands: Vec<WriteCommand>,
}

#[derive(Debug)]
struct MotorBinding {
    joint: JointId,
    config: MotorConfig,
    controller: MotorController,
}

#[derive(Debug)]
struct ServoBinding {
    name: String,
    joint: JointId,
    config: ServoConfig,
    /// Held while the servo is disabled.
    target: f64,
}

#[derive(Debug)]
struct SensorPort<T> {
    sensor: Box<dyn Sensor<Output = T>>,
    cache: ReadCache<T>,
}

impl<T: Copy> SensorPort<T> {
    fn new(sensor: Box<dyn Sensor<Output = T>>, initial: T) -> Self {
        Self {
            sensor,
            cache: ReadCache::new(initial),
        }
    }

    /// Reads through a copy of the cache; the caller stores it once the
    /// whole tick has succeeded.
    fn read(&mut self, engine: &mut dyn PhysicsEngine) -> Result<(ReadCache<T>, T), EngineError> {
        let mut cache = self.cache;
        let sensor = &mut self.sensor;
        let value = cache.step(|| sensor.get_value(engine))?;
        Ok((cache, value))
    }
}

/// One robot instance in a scene.
#[derive(Debug)]
pub struct RobotBinding {
    root_link: LinkId,
    motors: [Option<MotorBinding>; MOTOR_COUNT],
    servos: [Option<ServoBinding>; SERVO_COUNT],
    analogs: [Option<SensorPort<u16>>; ANALOG_COUNT],
    digitals: [Option<SensorPort<bool>>; DIGITAL_COUNT],
    last_tick: Option<f64>,
    visible: bool,
    realistic: bool,
    noisy: bool,
    claims: PortClaims,
    setup_errors: Vec<BindingError>,
}

impl RobotBinding {
    /// An empty binding whose origin tracks `root_link`.
    pub fn new(engine: &dyn PhysicsEngine, root_link: &str) -> Result<Self, BindingError> {
        let root_link = engine
            .resolve_link(root_link)
            .ok_or_else(|| BindingError::MissingLink(root_link.to_string()))?;
        Ok(Self {
            root_link,
            motors: std::array::from_fn(|_| None),
            servos: std::array::from_fn(|_| None),
            analogs: std::array::from_fn(|_| None),
            digitals: std::array::from_fn(|_| None),
            last_tick: None,
            visible: false,
            realistic: false,
            noisy: false,
            claims: PortClaims::default(),
            setup_errors: Vec::new(),
        })
    }

    /// Binds every node of `definition`.
    ///
    /// Motor and servo problems abort construction. A sensor that cannot be
    /// bound is skipped; its error is kept in [`setup_errors`](Self::setup_errors).
    pub fn from_definition(
        engine: &mut dyn PhysicsEngine,
        definition: &RobotDefinition,
    ) -> Result<Self, BindingError> {
        let mut binding = Self::new(engine, &definition.root_link)?;
        for motor in &definition.motors {
            binding.add_motor(engine, motor)?;
        }
        for servo in &definition.servos {
            binding.add_servo(engine, servo)?;
        }
        for sensor in &definition.sensors {
            if let Err(err) = binding.add_sensor(engine, sensor) {
                warn!(sensor = %sensor.name, error = %err, "skipping sensor");
                binding.setup_errors.push(err);
            }
        }

        info!(
            root = %definition.root_link,
            motors = binding.motors.iter().flatten().count(),
            servos = binding.servos.iter().flatten().count(),
            analog = binding.analogs.iter().flatten().count(),
            digital = binding.digitals.iter().flatten().count(),
            "robot bound"
        );
        Ok(binding)
    }

    pub fn add_motor(
        &mut self,
        engine: &dyn PhysicsEngine,
        node: &MotorNode,
    ) -> Result<(), BindingError> {
        node.validate()?;
        self.claims.check(PortKind::Motor, node.port, &node.name)?;
        let joint = engine
            .resolve_joint(&node.joint)
            .ok_or_else(|| BindingError::MissingJoint(node.joint.clone()))?;

        self.claims.claim(PortKind::Motor, node.port, &node.name)?;
        self.motors[node.port] = Some(MotorBinding {
            joint,
            config: node.config,
            controller: MotorController::new(),
        });
        Ok(())
    }

    pub fn add_servo(
        &mut self,
        engine: &dyn PhysicsEngine,
        node: &ServoNode,
    ) -> Result<(), BindingError> {
        node.validate()?;
        self.claims.check(PortKind::Servo, node.port, &node.name)?;
        let joint = engine
            .resolve_joint(&node.joint)
            .ok_or_else(|| BindingError::MissingJoint(node.joint.clone()))?;

        self.claims.claim(PortKind::Servo, node.port, &node.name)?;
        self.servos[node.port] = Some(ServoBinding {
            name: node.name.clone(),
            joint,
            config: node.config,
            target: servo_angle(SERVO_CENTER, &node.config),
        });
        Ok(())
    }

    /// Creates and binds a sensor. Distance and light sensors take an analog
    /// port, touch sensors a digital one.
    pub fn add_sensor(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        node: &SensorNode,
    ) -> Result<(), BindingError> {
        node.validate()?;
        let kind = node.kind.port_kind();
        self.claims.check(kind, node.port, &node.name)?;

        match node.kind {
            SensorKind::Distance(config) => {
                let sensor = DistanceSensor::new(engine, node, config)?;
                self.install_analog(engine, node.port, Box::new(sensor));
            }
            SensorKind::Light(config) => {
                let sensor = LightSensor::new(engine, node, config)?;
                self.install_analog(engine, node.port, Box::new(sensor));
            }
            SensorKind::Touch(config) => {
                let mut sensor: Box<dyn Sensor<Output = bool>> =
                    Box::new(TouchSensor::new(engine, node, config)?);
                self.configure(engine, sensor.as_mut());
                self.digitals[node.port] = Some(SensorPort::new(sensor, false));
            }
        }
        self.claims.claim(kind, node.port, &node.name)
    }

    fn install_analog(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        port: usize,
        mut sensor: Box<dyn Sensor<Output = u16>>,
    ) {
        self.configure(engine, sensor.as_mut());
        self.analogs[port] = Some(SensorPort::new(sensor, 0));
    }

    /// Applies the binding-wide sensor flags to a newly added sensor.
    fn configure<T: Copy>(&self, engine: &mut dyn PhysicsEngine, sensor: &mut dyn Sensor<Output = T>) {
        sensor.set_realistic(self.realistic);
        sensor.set_noisy(self.noisy);
        sensor.set_visible(engine, self.visible);
    }

    /// Sensors that could not be bound by [`from_definition`](Self::from_definition).
    pub fn setup_errors(&self) -> &[BindingError] {
        &self.setup_errors
    }

    /// Scratch state of the motor on `port`, if one is bound.
    pub fn motor_controller(&self, port: usize) -> Option<&MotorController> {
        assert!(port < MOTOR_COUNT, "motor port {port} out of range");
        self.motors[port].as_ref().map(|m| &m.controller)
    }

    /// Encoder position the motor on `port` is braking to.
    pub fn brake_target(&self, port: usize) -> Option<i32> {
        self.motor_controller(port).and_then(MotorController::brake_target)
    }

    /// Clears PID accumulators, brake latches and angle history, e.g. after
    /// the robot was teleported.
    pub fn reset_controllers(&mut self) {
        for motor in self.motors.iter_mut().flatten() {
            motor.controller.reset();
        }
        self.last_tick = None;
    }

    pub fn set_realistic_sensors(&mut self, realistic: bool) {
        self.realistic = realistic;
        for port in self.analogs.iter_mut().flatten() {
            port.sensor.set_realistic(realistic);
        }
        for port in self.digitals.iter_mut().flatten() {
            port.sensor.set_realistic(realistic);
        }
    }

    pub fn set_noisy_sensors(&mut self, noisy: bool) {
        self.noisy = noisy;
        for port in self.analogs.iter_mut().flatten() {
            port.sensor.set_noisy(noisy);
        }
        for port in self.digitals.iter_mut().flatten() {
            port.sensor.set_noisy(noisy);
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides every sensor trace.
    pub fn set_visible(&mut self, engine: &mut dyn PhysicsEngine, visible: bool) {
        self.visible = visible;
        for port in self.analogs.iter_mut().flatten() {
            port.sensor.set_visible(engine, visible);
        }
        for port in self.digitals.iter_mut().flatten() {
            port.sensor.set_visible(engine, visible);
        }
    }

    /// Releases every sensor's engine geometry and unbinds the sensors.
    pub fn dispose(&mut self, engine: &mut dyn PhysicsEngine) {
        for (index, slot) in self.analogs.iter_mut().enumerate() {
            if let Some(mut port) = slot.take() {
                port.sensor.dispose(engine);
                self.claims.release(PortKind::Analog, index);
            }
        }
        for (index, slot) in self.digitals.iter_mut().enumerate() {
            if let Some(mut port) = slot.take() {
                port.sensor.dispose(engine);
                self.claims.release(PortKind::Digital, index);
            }
        }
    }

    /// Runs one frame.
    ///
    /// Every engine query runs before any state is kept. On error the frame's
    /// command batch is discarded and the controllers, servo targets, sensor
    /// caches and clock are left as they were, so the next successful tick
    /// reports the joint travel of both frames.
    pub fn tick(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        readable: &dyn Readable,
    ) -> Result<TickOut, TickError> {
        let now = engine.now();
        let elapsed = self.last_tick.map(|last| now - last);

        let mut motor_steps: [Option<(MotorController, MotorStep)>; MOTOR_COUNT] =
            [None; MOTOR_COUNT];
        for (port, slot) in self.motors.iter().enumerate() {
            let Some(binding) = slot else { continue };
            let motor = readable.get_motor(port);
            let angle = engine
                .joint_angle(binding.joint)
                .map_err(|source| TickError::Motor { port, source })?;

            let mut controller = binding.controller;
            let step = controller.step(&motor, &binding.config, angle, elapsed);
            motor_steps[port] = Some((controller, step));
        }

        let mut servo_targets: [Option<(f64, f64)>; SERVO_COUNT] = [None; SERVO_COUNT];
        for (port, slot) in self.servos.iter().enumerate() {
            let Some(binding) = slot else { continue };
            let servo = readable.get_servo(port);
            let target = if servo.enabled {
                servo_angle(servo.position, &binding.config)
            } else {
                binding.target
            };

            let measured = engine
                .joint_angle(binding.joint)
                .map_err(|source| TickError::Servo { port, source })?;
            let rate = servo_rate(measured, target);
            trace!(servo = %binding.name, measured, target, rate, "servo step");
            servo_targets[port] = Some((target, rate));
        }

        let mut digital_reads: [Option<(ReadCache<bool>, bool)>; DIGITAL_COUNT] =
            [None; DIGITAL_COUNT];
        for (port, slot) in self.digitals.iter_mut().enumerate() {
            let Some(sensor) = slot else { continue };
            let read = sensor.read(engine).map_err(|source| TickError::Sensor {
                kind: PortKind::Digital,
                port,
                source,
            })?;
            digital_reads[port] = Some(read);
        }

        let mut analog_reads: [Option<(ReadCache<u16>, u16)>; ANALOG_COUNT] =
            [None; ANALOG_COUNT];
        for (port, slot) in self.analogs.iter_mut().enumerate() {
            let Some(sensor) = slot else { continue };
            let read = sensor.read(engine).map_err(|source| TickError::Sensor {
                kind: PortKind::Analog,
                port,
                source,
            })?;
            analog_reads[port] = Some(read);
        }

        let origin = engine.link_pose(self.root_link).map_err(TickError::Origin)?;

        for (port, slot) in self.motors.iter().enumerate() {
            let (Some(binding), Some((_, step))) = (slot, &motor_steps[port]) else {
                continue;
            };
            engine
                .set_joint_motor_velocity(binding.joint, step.joint_velocity)
                .map_err(|source| TickError::Motor { port, source })?;
        }
        for (port, slot) in self.servos.iter().enumerate() {
            let (Some(binding), Some((target, rate))) = (slot, servo_targets[port]) else {
                continue;
            };
            engine
                .set_servo_target(binding.joint, target, rate)
                .map_err(|source| TickError::Servo { port, source })?;
        }

        self.last_tick = Some(now);
        let mut write_commands = Vec::new();

        for (port, slot) in self.motors.iter_mut().enumerate() {
            let (Some(binding), Some((controller, step))) = (slot, motor_steps[port]) else {
                continue;
            };
            binding.controller = controller;

            write_commands.push(WriteCommand::AddMotorPosition {
                port,
                position_delta: step.position_delta,
            });
            if step.goal_reached {
                write_commands.push(WriteCommand::MotorDone { port, done: true });
            }
            if step.write_pwm {
                write_commands.push(WriteCommand::MotorPwm {
                    port,
                    pwm: step.pwm,
                });
            }
        }

        for (slot, staged) in self.servos.iter_mut().zip(servo_targets) {
            if let (Some(binding), Some((target, _))) = (slot, staged) {
                binding.target = target;
            }
        }

        for (port, (slot, staged)) in self.digitals.iter_mut().zip(digital_reads).enumerate() {
            if let (Some(sensor), Some((cache, value))) = (slot, staged) {
                sensor.cache = cache;
                write_commands.push(WriteCommand::DigitalIn { port, value });
            }
        }

        for (port, (slot, staged)) in self.analogs.iter_mut().zip(analog_reads).enumerate() {
            if let (Some(sensor), Some((cache, value))) = (slot, staged) {
                sensor.cache = cache;
                write_commands.push(WriteCommand::Analog { port, value });
            }
        }

        Ok(TickOut {
            origin,
            write_commands,
        })
    }
}
