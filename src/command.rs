//! Discrete mutations emitted by the control loop.

use crate::motor::Direction;
use serde::{Deserialize, Serialize};

/// A single mutation of robot state.
///
/// The control loop never mutates a robot directly. It produces an ordered
/// batch of these each tick, and the batch is applied in full by
/// [`Writable::apply`](crate::Writable::apply) before the next tick reads.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WriteCommand {
    DigitalIn { port: usize, value: bool },
    Analog { port: usize, value: u16 },
    MotorPosition { port: usize, position: i32 },
    AddMotorPosition { port: usize, position_delta: i32 },
    MotorPwm { port: usize, pwm: i16 },
    MotorDone { port: usize, done: bool },
    MotorDirection { port: usize, direction: Direction },
}

impl WriteCommand {
    /// The port the command addresses.
    pub fn port(&self) -> usize {
        match *self {
            WriteCommand::DigitalIn { port, .. }
            | WriteCommand::Analog { port, .. }
            | WriteCommand::MotorPosition { port, .. }
            | WriteCommand::AddMotorPosition { port, .. }
            | WriteCommand::MotorPwm { port, .. }
            | WriteCommand::MotorDone { port, .. }
            | WriteCommand::MotorDirection { port, .. } => port,
        }
    }
}
