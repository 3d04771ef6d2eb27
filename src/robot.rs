//! The abstract robot: a read/write contract over motors, servos and I/O ports.
//!
//! Concrete representations (the register file, a plain in-memory struct)
//! implement [`Readable`] and [`Writable`]. The control loop only ever reads
//! through [`Readable`] and hands its [`WriteCommand`] batch to [`Writable`].

use crate::command::WriteCommand;
use crate::motor::{
    ANALOG_COUNT, DIGITAL_COUNT, Direction, MOTOR_COUNT, Motor, SERVO_COUNT, Servo,
};
use serde::{Deserialize, Serialize};

/// Read access to a robot's ports.
///
/// Ports are caller-guaranteed to be in range; implementations panic otherwise.
pub trait Readable {
    fn get_motor(&self, port: usize) -> Motor;
    fn get_servo(&self, port: usize) -> Servo;
    fn get_analog_value(&self, port: usize) -> u16;
    fn get_digital_value(&self, port: usize) -> bool;
}

/// Write access to a robot.
pub trait Writable {
    /// Applies a tick's commands in order.
    fn apply(&mut self, write_commands: &[WriteCommand]);

    /// Overwrites the whole robot state with `stateless`.
    fn sync(&mut self, stateless: &Stateless);
}

/// A robot that can be both read and written.
pub trait AbstractRobot: Readable + Writable {}

impl<T: Readable + Writable> AbstractRobot for T {}

/// An immutable whole-robot snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stateless {
    pub motors: [Motor; MOTOR_COUNT],
    pub servos: [Servo; SERVO_COUNT],
    pub analog_values: [u16; ANALOG_COUNT],
    pub digital_values: [bool; DIGITAL_COUNT],
}

impl Stateless {
    pub const NIL: Stateless = Stateless {
        motors: [Motor::NIL; MOTOR_COUNT],
        servos: [Servo::NIL; SERVO_COUNT],
        analog_values: [0; ANALOG_COUNT],
        digital_values: [false; DIGITAL_COUNT],
    };

    /// Reads every port of `robot` into a snapshot.
    pub fn from_robot<R: Readable + ?Sized>(robot: &R) -> Self {
        Self {
            motors: std::array::from_fn(|port| robot.get_motor(port)),
            servos: std::array::from_fn(|port| robot.get_servo(port)),
            analog_values: std::array::from_fn(|port| robot.get_analog_value(port)),
            digital_values: std::array::from_fn(|port| robot.get_digital_value(port)),
        }
    }

    /// Compares two snapshots as opaque units.
    pub fn diff(prev: &Stateless, next: &Stateless) -> StatelessPatch {
        if prev == next {
            StatelessPatch::None { prev: *prev }
        } else {
            StatelessPatch::OuterChange {
                prev: *prev,
                next: *next,
            }
        }
    }
}

/// Shorthand for [`Stateless::from_robot`].
pub fn to_stateless<R: Readable + ?Sized>(robot: &R) -> Stateless {
    Stateless::from_robot(robot)
}

/// The result of diffing two snapshots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatelessPatch {
    /// Nothing changed.
    None { prev: Stateless },
    /// The snapshot was replaced.
    OuterChange { prev: Stateless, next: Stateless },
}

impl StatelessPatch {
    pub fn is_changed(&self) -> bool {
        matches!(self, StatelessPatch::OuterChange { .. })
    }

    /// The state after the patch.
    pub fn next(&self) -> &Stateless {
        match self {
            StatelessPatch::None { prev } => prev,
            StatelessPatch::OuterChange { next, .. } => next,
        }
    }
}

/// A robot held as plain fields. Useful for tests and replay.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemoryRobot {
    state: Stateless,
}

impl InMemoryRobot {
    pub fn new() -> Self {
        Self {
            state: Stateless::NIL,
        }
    }

    pub fn from_stateless(state: Stateless) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Stateless {
        &self.state
    }

    pub fn motor_mut(&mut self, port: usize) -> &mut Motor {
        assert!(port < MOTOR_COUNT, "motor port {port} out of range");
        &mut self.state.motors[port]
    }

    pub fn servo_mut(&mut self, port: usize) -> &mut Servo {
        assert!(port < SERVO_COUNT, "servo port {port} out of range");
        &mut self.state.servos[port]
    }

    fn apply_one(&mut self, write_command: &WriteCommand) {
        match *write_command {
            WriteCommand::DigitalIn { port, value } => {
                assert!(port < DIGITAL_COUNT, "digital port {port} out of range");
                self.state.digital_values[port] = value;
            }
            WriteCommand::Analog { port, value } => {
                assert!(port < ANALOG_COUNT, "analog port {port} out of range");
                self.state.analog_values[port] = value;
            }
            WriteCommand::MotorPosition { port, position } => {
                self.motor_mut(port).position = position;
            }
            WriteCommand::AddMotorPosition {
                port,
                position_delta,
            } => {
                let motor = self.motor_mut(port);
                motor.position = motor.position.wrapping_add(position_delta);
            }
            WriteCommand::MotorPwm { port, pwm } => {
                let motor = self.motor_mut(port);
                motor.pwm = pwm;
                motor.direction = Direction::from_pwm(pwm);
            }
            WriteCommand::MotorDone { port, done } => {
                // Mirrors the done bitmask: set here, cleared only by sync.
                if done {
                    self.motor_mut(port).done = true;
                }
            }
            WriteCommand::MotorDirection { port, direction } => {
                self.motor_mut(port).direction = direction;
            }
        }
    }
}

impl Readable for InMemoryRobot {
    fn get_motor(&self, port: usize) -> Motor {
        assert!(port < MOTOR_COUNT, "motor port {port} out of range");
        self.state.motors[port]
    }

    fn get_servo(&self, port: usize) -> Servo {
        assert!(port < SERVO_COUNT, "servo port {port} out of range");
        self.state.servos[port]
    }

    fn get_analog_value(&self, port: usize) -> u16 {
        assert!(port < ANALOG_COUNT, "analog port {port} out of range");
        self.state.analog_values[port]
    }

    fn get_digital_value(&self, port: usize) -> bool {
        assert!(port < DIGITAL_COUNT, "digital port {port} out of range");
        self.state.digital_values[port]
    }
}

impl Writable for InMemoryRobot {
    fn apply(&mut self, write_commands: &[WriteCommand]) {
        for write_command in write_commands {
            self.apply_one(write_command);
        }
    }

    fn sync(&mut self, stateless: &Stateless) {
        self.state = *stateless;
    }
}
