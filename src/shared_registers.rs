//! The hardware view of a robot: [`Readable`]/[`Writable`] over a [`RegisterFile`].

use crate::command::WriteCommand;
use crate::motor::{DIGITAL_COUNT, Direction, MOTOR_COUNT, Mode, Motor, SERVO_MAX, Servo};
use crate::registers::{self, PidTerm, RegisterFile};
use crate::robot::{Readable, Stateless, Writable};

/// Reads and writes robot state through the controller's register layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedRegistersRobot {
    registers: RegisterFile,
}

impl SharedRegistersRobot {
    pub fn new(registers: RegisterFile) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn into_registers(self) -> RegisterFile {
        self.registers
    }

    fn motor_done(&self, port: usize) -> bool {
        self.registers.get_u8(registers::REG_RW_MOT_DONE) & registers::done_bit(port) != 0
    }

    fn pid_gain(&self, port: usize, term: PidTerm) -> f64 {
        let (num, den) = registers::pid_gain(port, term);
        let den = self.registers.get_u16(den);
        if den == 0 {
            return 0.0;
        }
        f64::from(self.registers.get_u16(num)) / f64::from(den)
    }

    /// Stores `gain` truncated to thousandths.
    ///
    /// The numerator register is unsigned: negative gains cannot be
    /// represented and are stored as 0, and gains above 65.535 saturate.
    fn set_pid_gain(&mut self, port: usize, term: PidTerm, gain: f64) {
        let (num, den) = registers::pid_gain(port, term);
        let numerator = (gain * f64::from(registers::PID_DENOMINATOR)).trunc() as u16;
        self.registers.set_u16(num, numerator);
        self.registers.set_u16(den, registers::PID_DENOMINATOR);
    }

    fn set_direction(&mut self, port: usize, direction: Direction) {
        let directions = self.registers.get_u8(registers::REG_RW_MOT_DIRS);
        self.registers.set_u8(
            registers::REG_RW_MOT_DIRS,
            registers::with_bits2(directions, port, direction.to_bits()),
        );
    }

    fn apply_one(&mut self, write_command: &WriteCommand) {
        match *write_command {
            WriteCommand::MotorDone { port, done } => {
                // Done bits are only ever set here; `sync` clears them.
                if done {
                    let mask = self.registers.get_u8(registers::REG_RW_MOT_DONE);
                    self.registers.set_u8(
                        registers::REG_RW_MOT_DONE,
                        mask | registers::done_bit(port),
                    );
                }
            }
            WriteCommand::MotorPosition { port, position } => {
                self.registers.set_i32(
                    registers::motor_position(port),
                    position.wrapping_mul(registers::POSITION_SCALING),
                );
            }
            WriteCommand::AddMotorPosition {
                port,
                position_delta,
            } => {
                self.registers.add_i32(
                    registers::motor_position(port),
                    position_delta.wrapping_mul(registers::POSITION_SCALING),
                );
            }
            WriteCommand::MotorPwm { port, pwm } => {
                let address = registers::motor_pwm(port);
                self.set_direction(port, Direction::from_pwm(pwm));
                self.registers.set_u16(address, pwm.unsigned_abs());
            }
            WriteCommand::DigitalIn { port, value } => {
                assert!(port < DIGITAL_COUNT, "digital port {port} out of range");
                let mut bits = self.registers.get_u8(registers::REG_RW_DIG_IN_H);
                bits &= !(1 << port);
                if value {
                    bits |= 1 << port;
                }
                self.registers.set_u8(registers::REG_RW_DIG_IN_H, bits);
            }
            WriteCommand::Analog { port, value } => {
                self.registers.set_u16(registers::adc(port), value);
            }
            WriteCommand::MotorDirection { port, direction } => {
                assert!(port < MOTOR_COUNT, "motor port {port} out of range");
                self.set_direction(port, direction);
            }
        }
    }
}

/// Servo pulse width (µs) to position. 1500 µs is center, 10 µs per degree.
pub fn servo_register_to_position(pulse: u16) -> u16 {
    let degrees = (f64::from(pulse) - 1500.0) / 10.0;
    let position = (degrees + 90.0) * f64::from(SERVO_MAX) / 180.0;
    position.clamp(0.0, f64::from(SERVO_MAX)).round() as u16
}

/// Servo position to pulse width (µs).
pub fn position_to_servo_register(position: u16) -> u16 {
    let degrees = f64::from(position) * 180.0 / f64::from(SERVO_MAX) - 90.0;
    (degrees * 10.0 + 1500.0).round() as u16
}

impl Readable for SharedRegistersRobot {
    fn get_motor(&self, port: usize) -> Motor {
        let modes = self.registers.get_u8(registers::REG_RW_MOT_MODES);
        let directions = self.registers.get_u8(registers::REG_RW_MOT_DIRS);
        let mode = Mode::from_bits(registers::get_bits2(modes, port));
        let direction = Direction::from_bits(registers::get_bits2(directions, port));

        let pwm = self.registers.get_u16(registers::motor_pwm(port)) as i16;

        Motor {
            mode,
            direction,
            position: self.registers.get_i32(registers::motor_position(port))
                / registers::POSITION_SCALING,
            pwm: if direction == Direction::Backward {
                pwm.wrapping_neg()
            } else {
                pwm
            },
            done: self.motor_done(port),
            position_goal: self.registers.get_i32(registers::motor_position_goal(port))
                / registers::POSITION_SCALING,
            speed_goal: self.registers.get_i16(registers::motor_speed_goal(port)),
            k_p: self.pid_gain(port, PidTerm::P),
            k_i: self.pid_gain(port, PidTerm::I),
            k_d: self.pid_gain(port, PidTerm::D),
        }
    }

    fn get_servo(&self, port: usize) -> Servo {
        let pulse = self.registers.get_u16(registers::servo_pulse(port));
        let all_stop = self.registers.get_u8(registers::REG_RW_MOT_SRV_ALLSTOP);
        Servo {
            enabled: all_stop & registers::servo_disable_bit(port) == 0,
            position: servo_register_to_position(pulse),
        }
    }

    fn get_analog_value(&self, port: usize) -> u16 {
        self.registers.get_u16(registers::adc(port))
    }

    fn get_digital_value(&self, port: usize) -> bool {
        assert!(port < DIGITAL_COUNT, "digital port {port} out of range");
        self.registers.get_u8(registers::REG_RW_DIG_IN_H) & (1 << port) != 0
    }
}

impl Writable for SharedRegistersRobot {
    fn apply(&mut self, write_commands: &[WriteCommand]) {
        for write_command in write_commands {
            self.apply_one(write_command);
        }
    }

    fn sync(&mut self, stateless: &Stateless) {
        let mut modes = 0u8;
        let mut directions = 0u8;
        let mut done = 0u8;

        for (port, motor) in stateless.motors.iter().enumerate() {
            modes = registers::with_bits2(modes, port, motor.mode.to_bits());
            directions = registers::with_bits2(directions, port, motor.direction.to_bits());
            if motor.done {
                done |= registers::done_bit(port);
            }

            self.registers
                .set_u16(registers::motor_pwm(port), motor.pwm.unsigned_abs());
            self.registers.set_i32(
                registers::motor_position_goal(port),
                motor.position_goal.wrapping_mul(registers::POSITION_SCALING),
            );
            self.registers
                .set_i16(registers::motor_speed_goal(port), motor.speed_goal);
            self.registers.set_i32(
                registers::motor_position(port),
                motor.position.wrapping_mul(registers::POSITION_SCALING),
            );

            self.set_pid_gain(port, PidTerm::P, motor.k_p);
            self.set_pid_gain(port, PidTerm::I, motor.k_i);
            self.set_pid_gain(port, PidTerm::D, motor.k_d);
        }

        self.registers.set_u8(registers::REG_RW_MOT_MODES, modes);
        self.registers.set_u8(registers::REG_RW_MOT_DIRS, directions);
        self.registers.set_u8(registers::REG_RW_MOT_DONE, done);

        let mut all_stop = 0u8;
        for (port, servo) in stateless.servos.iter().enumerate() {
            self.registers.set_u16(
                registers::servo_pulse(port),
                position_to_servo_register(servo.position),
            );
            if !servo.enabled {
                all_stop |= registers::servo_disable_bit(port);
            }
        }
        self.registers
            .set_u8(registers::REG_RW_MOT_SRV_ALLSTOP, all_stop);

        for (port, value) in stateless.analog_values.iter().enumerate() {
            self.registers.set_u16(registers::adc(port), *value);
        }

        let digital = stateless
            .digital_values
            .iter()
            .enumerate()
            .fold(0u8, |bits, (port, value)| bits | (u8::from(*value) << port));
        self.registers.set_u8(registers::REG_RW_DIG_IN_H, digital);
    }
}
