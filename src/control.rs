//! Per-port control laws: encoder emulation, brake handling and the firmware
//! PID for motors, angle mapping for servos.
//!
//! Nothing here touches the engine. [`MotorController::step`] takes a measured
//! hinge angle and returns what the binding must emit and command.

use crate::config::{MotorConfig, ServoConfig};
use crate::motor::{Direction, Mode, Motor, PWM_MAX, SERVO_CENTER, SERVO_MAX};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_8, PI, TAU};
use tracing::{debug, trace};

/// Bound on the accumulated PID integral error.
pub const INTEGRAL_LIMIT: f64 = 10_000.0;

/// Ticks per second used to creep back onto a brake latch.
pub const BRAKE_SPEED: i16 = 2;

/// Angular span covered by the servo position range.
pub const SERVO_LOGICAL_RANGE: f64 = PI;

/// Servo convergence rate while far from target, rad/s.
pub const SERVO_COARSE_RATE: f64 = 0.4 * PI;
/// Servo convergence rate once within [`SERVO_SETTLE_THRESHOLD`], rad/s.
pub const SERVO_FINE_RATE: f64 = 0.1 * PI;
pub const SERVO_SETTLE_THRESHOLD: f64 = FRAC_PI_8;

/// Change between two hinge readings in `(-π, π]`, unwrapped across the ±π seam.
pub fn wrapped_angle_delta(last: f64, current: f64) -> f64 {
    if last > FRAC_PI_2 && current < -FRAC_PI_2 {
        current + TAU - last
    } else if last < -FRAC_PI_2 && current > FRAC_PI_2 {
        current - TAU - last
    } else {
        current - last
    }
}

/// What one motor port produced this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorStep {
    /// Whole encoder ticks travelled since the previous tick.
    pub position_delta: i32,
    /// Duty cycle after clamping and plug correction.
    pub pwm: i16,
    /// Whether `pwm` should be written back to the robot.
    pub write_pwm: bool,
    /// The position goal was passed this tick.
    pub goal_reached: bool,
    /// Angular velocity to command on the hinge, rad/s.
    pub joint_velocity: f64,
}

/// Scratch state the control loop keeps for one motor between ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorController {
    last_p_err: f64,
    i_err: f64,
    brake_at: Option<i32>,
    position_delta_frac: f64,
    last_angle: Option<f64>,
}

impl MotorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder position latched by an active brake.
    pub fn brake_target(&self) -> Option<i32> {
        self.brake_at
    }

    pub fn integral_error(&self) -> f64 {
        self.i_err
    }

    /// Forgets accumulated errors, brake latch and angle history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn reset_errors(&mut self) {
        self.last_p_err = 0.0;
        self.i_err = 0.0;
    }

    /// Advances the encoder and returns the whole-tick delta and velocity in ticks/s.
    fn advance_encoder(&mut self, config: &MotorConfig, angle: f64, elapsed: Option<f64>) -> (i32, f64) {
        let delta_angle = match self.last_angle {
            Some(last) => wrapped_angle_delta(last, angle),
            None => 0.0,
        };
        self.last_angle = Some(angle);

        let ticks_per_radian = config.plug.sign() * config.ticks_per_revolution / TAU;
        let raw = delta_angle * ticks_per_radian + self.position_delta_frac;
        let whole = raw.trunc();
        self.position_delta_frac = raw - whole;

        let velocity = match elapsed {
            Some(dt) if dt > 0.0 => delta_angle / dt * ticks_per_radian,
            _ => 0.0,
        };
        (whole as i32, velocity)
    }

    /// Runs one tick of the motor law against the robot's view of `motor`.
    pub fn step(
        &mut self,
        motor: &Motor,
        config: &MotorConfig,
        angle: f64,
        elapsed: Option<f64>,
    ) -> MotorStep {
        let (position_delta, velocity) = self.advance_encoder(config, angle, elapsed);
        let next_position = motor.position.wrapping_add(position_delta);

        let mut mode = motor.mode;
        let mut pwm = f64::from(motor.pwm);
        let mut done = motor.done;
        let mut position_goal = motor.position_goal;
        let mut speed_goal = motor.speed_goal;
        let mut write_pwm = true;
        let mut goal_reached = false;

        // Idle coasts: the brake latch and PID history are left as they are.
        if mode == Mode::Pwm && motor.direction == Direction::Idle {
            return MotorStep {
                position_delta,
                pwm: 0,
                write_pwm: false,
                goal_reached: false,
                joint_velocity: 0.0,
            };
        }

        if mode == Mode::Pwm && motor.direction == Direction::Brake {
            let brake_at = match self.brake_at {
                Some(at) => at,
                None => {
                    debug!(position = motor.position, "brake latched");
                    self.reset_errors();
                    *self.brake_at.insert(motor.position)
                }
            };

            done = false;
            if brake_at == motor.position {
                mode = Mode::Pwm;
                pwm = 0.0;
            } else {
                mode = Mode::SpeedPosition;
                position_goal = brake_at;
                speed_goal = if motor.position > brake_at {
                    -BRAKE_SPEED
                } else {
                    BRAKE_SPEED
                };
            }
            write_pwm = false;
        } else if let Some(at) = self.brake_at.take() {
            debug!(brake_at = at, "brake released");
        }

        if mode != Mode::Pwm && !done {
            let speed_goal_f = f64::from(speed_goal);
            let p_err = speed_goal_f - velocity;
            let d_err = p_err - self.last_p_err;
            self.last_p_err = p_err;
            self.i_err = (self.i_err + p_err).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);

            pwm = speed_goal_f / config.velocity_max * f64::from(PWM_MAX)
                + motor.k_p * p_err
                + motor.k_i * self.i_err
                + motor.k_d * d_err;

            let passed = (speed_goal < 0 && next_position < position_goal)
                || (speed_goal > 0 && next_position > position_goal);
            if mode.has_position_goal() && passed {
                debug!(next_position, position_goal, "position goal reached");
                pwm = 0.0;
                goal_reached = true;
            }
        } else {
            self.reset_errors();
        }

        let limit = f64::from(PWM_MAX);
        // NaN (from non-finite gains) clamps to NaN and then casts to 0.
        let pwm = config.plug.sign() * pwm.clamp(-limit, limit);
        let joint_velocity =
            pwm / limit * config.velocity_max * TAU / config.ticks_per_revolution;

        trace!(
            position_delta,
            velocity,
            pwm,
            p_err = self.last_p_err,
            i_err = self.i_err,
            "motor step"
        );

        MotorStep {
            position_delta,
            pwm: pwm as i16,
            write_pwm,
            goal_reached,
            joint_velocity,
        }
    }
}

/// Hinge angle for a servo register position.
pub fn servo_angle(position: u16, config: &ServoConfig) -> f64 {
    let position = f64::from(position.min(SERVO_MAX));
    let desired = (position - f64::from(SERVO_CENTER)) / 2048.0 * SERVO_LOGICAL_RANGE;
    desired.clamp(config.min_angle, config.max_angle) + config.twist
}

/// Convergence rate for a servo currently at `measured` heading to `target`.
pub fn servo_rate(measured: f64, target: f64) -> f64 {
    if (measured - target).abs() > SERVO_SETTLE_THRESHOLD {
        SERVO_COARSE_RATE
    } else {
        SERVO_FINE_RATE
    }
}
