//! Motor and servo state as seen through the controller's register interface.

use serde::{Deserialize, Serialize};

/// Number of motor ports on the controller.
pub const MOTOR_COUNT: usize = 4;
/// Number of servo ports on the controller.
pub const SERVO_COUNT: usize = 4;
/// Number of analog input channels.
pub const ANALOG_COUNT: usize = 6;
/// Number of digital input channels.
pub const DIGITAL_COUNT: usize = 6;

/// Largest duty cycle magnitude the controller accepts.
pub const PWM_MAX: i16 = 400;

/// Center position of a servo (register units).
pub const SERVO_CENTER: u16 = 1024;
/// Largest servo position (register units).
pub const SERVO_MAX: u16 = 2047;

/// The control law applied to a motor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Raw duty cycle, no closed loop.
    #[default]
    Pwm,
    /// Hold a target velocity.
    Speed,
    /// Run toward a position goal.
    Position,
    /// Run toward a position goal at a target velocity.
    SpeedPosition,
}

impl Mode {
    /// Decodes the two-bit register encoding.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Mode::Pwm,
            1 => Mode::Speed,
            2 => Mode::Position,
            _ => Mode::SpeedPosition,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Mode::Pwm => 0,
            Mode::Speed => 1,
            Mode::Position => 2,
            Mode::SpeedPosition => 3,
        }
    }

    /// Whether the mode stops once `position_goal` is passed.
    pub fn has_position_goal(self) -> bool {
        matches!(self, Mode::Position | Mode::SpeedPosition)
    }
}

/// Direction bits of a motor. Only meaningful in [`Mode::Pwm`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Idle,
    Forward,
    Backward,
    #[default]
    Brake,
}

impl Direction {
    /// Decodes the two-bit register encoding.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Direction::Idle,
            1 => Direction::Forward,
            2 => Direction::Backward,
            _ => Direction::Brake,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Direction::Idle => 0,
            Direction::Forward => 1,
            Direction::Backward => 2,
            Direction::Brake => 3,
        }
    }

    /// The direction the controller reports for a signed duty cycle.
    pub fn from_pwm(pwm: i16) -> Self {
        match pwm.signum() {
            0 => Direction::Idle,
            1 => Direction::Forward,
            _ => Direction::Backward,
        }
    }
}

/// The full state of one motor port.
///
/// `position` is an accumulated encoder tick count. It is only advanced by
/// [`WriteCommand::AddMotorPosition`](crate::WriteCommand::AddMotorPosition)
/// during normal operation and overwritten wholesale only on reset or sync.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Motor {
    pub mode: Mode,
    pub direction: Direction,

    /// Encoder ticks.
    pub position: i32,
    /// Applied duty cycle in `[-400, 400]`.
    pub pwm: i16,

    /// Goal reached (or nothing to do).
    pub done: bool,

    /// Target tick count for the position modes.
    pub position_goal: i32,
    /// Target velocity in ticks per second. The sign gives the travel direction.
    pub speed_goal: i16,

    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
}

impl Motor {
    /// The power-on state of a motor port.
    pub const NIL: Motor = Motor {
        mode: Mode::Pwm,
        direction: Direction::Brake,
        position: 0,
        pwm: 0,
        done: true,
        position_goal: 0,
        speed_goal: 0,
        k_p: 0.001,
        k_i: 0.001,
        k_d: 0.001,
    };
}

impl Default for Motor {
    fn default() -> Self {
        Self::NIL
    }
}

/// The state of one servo port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Servo {
    pub enabled: bool,
    /// Commanded position in `[0, 2047]`; 1024 is center.
    pub position: u16,
}

impl Servo {
    pub const NIL: Servo = Servo {
        enabled: false,
        position: SERVO_CENTER,
    };
}

impl Default for Servo {
    fn default() -> Self {
        Self::NIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_roundtrip_for_every_variant() {
        for bits in 0..4u8 {
            assert_eq!(Mode::from_bits(bits).to_bits(), bits);
            assert_eq!(Direction::from_bits(bits).to_bits(), bits);
        }
    }

    #[test]
    fn direction_follows_pwm_sign() {
        assert_eq!(Direction::from_pwm(0), Direction::Idle);
        assert_eq!(Direction::from_pwm(12), Direction::Forward);
        assert_eq!(Direction::from_pwm(-400), Direction::Backward);
    }
}
