//! The controller's register file.
//!
//! Addresses, widths and bit layouts below are a stable contract shared with
//! whatever consumes the raw bytes (a user-program process, a hardware
//! emulator). Multi-byte registers are big-endian: the `_H`/`B3` byte sits at
//! the lower address. Changing any offset requires bumping
//! [`SPI_VERSION`].

use crate::motor::{ANALOG_COUNT, MOTOR_COUNT, SERVO_COUNT};

/// Layout version reported through [`REG_R_VERSION_H`]/[`REG_R_VERSION_L`].
pub const SPI_VERSION: u16 = 4;

// Read-only
pub const REG_R_START: usize = 0;
pub const REG_R_VERSION_H: usize = 1;
pub const REG_R_VERSION_L: usize = 2;

// Read/write
pub const REG_RW_DIG_IN_H: usize = 3;
pub const REG_RW_DIG_IN_L: usize = 4;
pub const REG_RW_DIG_OUT_H: usize = 5;
pub const REG_RW_DIG_OUT_L: usize = 6;
pub const REG_RW_DIG_PE_H: usize = 7;
pub const REG_RW_DIG_PE_L: usize = 8;
pub const REG_RW_DIG_OE_H: usize = 9;
pub const REG_RW_DIG_OE_L: usize = 10;

/// First of six 16-bit ADC results (12 bits used).
pub const REG_RW_ADC_0_H: usize = 11;
/// Low six bits used.
pub const REG_RW_ADC_PE: usize = 23;

pub const REG_RW_MAG_X_H: usize = 24;
pub const REG_RW_ACCEL_X_H: usize = 30;
pub const REG_RW_GYRO_X_H: usize = 36;

/// First of four signed 32-bit motor positions (`B3` byte).
pub const REG_RW_MOT_0_B3: usize = 42;

/// Two bits per motor: Pwm, Speed, Position, SpeedPosition.
pub const REG_RW_MOT_MODES: usize = 58;
/// Two bits per motor: Idle, Forward, Backward, Brake.
pub const REG_RW_MOT_DIRS: usize = 59;
/// Low four bits: `0000 (chan0) (chan1) (chan2) (chan3)`.
pub const REG_RW_MOT_DONE: usize = 60;
/// Bit 1 is motor all-stop, bit 0 servo all-stop, bits 4..8 disable servos.
pub const REG_RW_MOT_SRV_ALLSTOP: usize = 61;

/// First of four signed 16-bit speed goals.
pub const REG_RW_MOT_0_SP_H: usize = 62;
/// First of four unsigned 16-bit PWM magnitudes.
pub const REG_RW_MOT_0_PWM_H: usize = 70;
/// First of four unsigned 16-bit servo pulses in microseconds (1500 is neutral).
pub const REG_RW_SERVO_0_H: usize = 78;

pub const REG_RW_BATT_H: usize = 86;
/// `E x 5 4 3 2 1 0`: extra-show flag, unused bit, six virtual buttons.
pub const REG_RW_BUTTONS: usize = 88;

pub const REG_READABLE_COUNT: usize = 89;

// Write-only. PID gains are numerator/denominator pairs, twelve bytes per motor.
pub const REG_W_PID_0_P_H: usize = 89;
pub const REG_W_PID_0_PD_H: usize = 91;
pub const REG_W_PID_0_I_H: usize = 93;
pub const REG_W_PID_0_ID_H: usize = 95;
pub const REG_W_PID_0_D_H: usize = 97;
pub const REG_W_PID_0_DD_H: usize = 99;
pub const PID_STRIDE: usize = 12;

/// First of four signed 32-bit position goals.
pub const REG_W_MOT_0_GOAL_B3: usize = 137;

pub const REG_ALL_COUNT: usize = 153;

/// Motor positions and goals are stored multiplied by this factor.
pub const POSITION_SCALING: i32 = 250;

/// Denominator used when storing a floating PID gain as a fraction.
pub const PID_DENOMINATOR: u16 = 1000;

/// Address of motor `port`'s 32-bit position.
pub fn motor_position(port: usize) -> usize {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    REG_RW_MOT_0_B3 + port * 4
}

/// Address of motor `port`'s 32-bit position goal.
pub fn motor_position_goal(port: usize) -> usize {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    REG_W_MOT_0_GOAL_B3 + port * 4
}

pub fn motor_speed_goal(port: usize) -> usize {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    REG_RW_MOT_0_SP_H + port * 2
}

pub fn motor_pwm(port: usize) -> usize {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    REG_RW_MOT_0_PWM_H + port * 2
}

pub fn servo_pulse(port: usize) -> usize {
    assert!(port < SERVO_COUNT, "servo port {port} out of range");
    REG_RW_SERVO_0_H + port * 2
}

pub fn adc(port: usize) -> usize {
    assert!(port < ANALOG_COUNT, "analog port {port} out of range");
    REG_RW_ADC_0_H + port * 2
}

/// One PID gain of one motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PidTerm {
    P,
    I,
    D,
}

/// Addresses of the `(numerator, denominator)` pair of a PID gain.
pub fn pid_gain(port: usize, term: PidTerm) -> (usize, usize) {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    let base = port * PID_STRIDE;
    match term {
        PidTerm::P => (REG_W_PID_0_P_H + base, REG_W_PID_0_PD_H + base),
        PidTerm::I => (REG_W_PID_0_I_H + base, REG_W_PID_0_ID_H + base),
        PidTerm::D => (REG_W_PID_0_D_H + base, REG_W_PID_0_DD_H + base),
    }
}

/// Extracts the two bits belonging to `port` from a packed register.
pub fn get_bits2(register: u8, port: usize) -> u8 {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    (register >> (port * 2)) & 0b11
}

/// Replaces the two bits belonging to `port` in a packed register.
pub fn with_bits2(register: u8, port: usize, bits: u8) -> u8 {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    let shift = port * 2;
    (register & !(0b11 << shift)) | ((bits & 0b11) << shift)
}

/// Bit of motor `port` in [`REG_RW_MOT_DONE`].
pub fn done_bit(port: usize) -> u8 {
    assert!(port < MOTOR_COUNT, "motor port {port} out of range");
    1 << (3 - port)
}

/// Bit that disables servo `port` in [`REG_RW_MOT_SRV_ALLSTOP`].
pub fn servo_disable_bit(port: usize) -> u8 {
    assert!(port < SERVO_COUNT, "servo port {port} out of range");
    1 << (port + 4)
}

/// A flat, fixed-size byte buffer addressed by register number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    bytes: Vec<u8>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// A zeroed register file carrying [`SPI_VERSION`].
    pub fn new() -> Self {
        let mut registers = Self {
            bytes: vec![0; REG_ALL_COUNT],
        };
        registers.set_u16(REG_R_VERSION_H, SPI_VERSION);
        registers
    }

    /// Wraps raw bytes produced by another consumer of the layout.
    ///
    /// Returns `None` unless `bytes` is exactly [`REG_ALL_COUNT`] long.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() == REG_ALL_COUNT).then_some(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A copy of the raw bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn window<const N: usize>(&self, address: usize) -> [u8; N] {
        assert!(
            address + N <= self.bytes.len(),
            "register {address} (+{N}) out of bounds"
        );
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes[address..address + N]);
        out
    }

    fn write<const N: usize>(&mut self, address: usize, value: [u8; N]) {
        assert!(
            address + N <= self.bytes.len(),
            "register {address} (+{N}) out of bounds"
        );
        self.bytes[address..address + N].copy_from_slice(&value);
    }

    pub fn get_u8(&self, address: usize) -> u8 {
        self.window::<1>(address)[0]
    }

    pub fn set_u8(&mut self, address: usize, value: u8) {
        self.write(address, [value]);
    }

    pub fn get_u16(&self, address: usize) -> u16 {
        u16::from_be_bytes(self.window(address))
    }

    pub fn get_i16(&self, address: usize) -> i16 {
        i16::from_be_bytes(self.window(address))
    }

    pub fn set_u16(&mut self, address: usize, value: u16) {
        self.write(address, value.to_be_bytes());
    }

    pub fn set_i16(&mut self, address: usize, value: i16) {
        self.write(address, value.to_be_bytes());
    }

    pub fn get_u32(&self, address: usize) -> u32 {
        u32::from_be_bytes(self.window(address))
    }

    pub fn get_i32(&self, address: usize) -> i32 {
        i32::from_be_bytes(self.window(address))
    }

    pub fn set_i32(&mut self, address: usize, value: i32) {
        self.write(address, value.to_be_bytes());
    }

    /// Adds `delta` to a signed 32-bit register, wrapping at the register width.
    pub fn add_i32(&mut self, address: usize, delta: i32) {
        let value = self.get_i32(address).wrapping_add(delta);
        self.set_i32(address, value);
    }

    /// Reads the version registers.
    pub fn version(&self) -> u16 {
        self.get_u16(REG_R_VERSION_H)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_byte_values_are_big_endian() {
        let mut registers = RegisterFile::new();
        registers.set_i32(motor_position(1), 0x0102_0304);
        let at = motor_position(1);
        assert_eq!(&registers.as_bytes()[at..at + 4], &[1, 2, 3, 4]);

        registers.set_i16(motor_speed_goal(0), -2);
        assert_eq!(registers.get_u8(REG_RW_MOT_0_SP_H), 0xFF);
        assert_eq!(registers.get_u8(REG_RW_MOT_0_SP_H + 1), 0xFE);
    }

    #[test]
    fn packed_bits_do_not_disturb_neighbours() {
        let mut register = 0u8;
        for port in 0..MOTOR_COUNT {
            register = with_bits2(register, port, port as u8);
        }
        for port in 0..MOTOR_COUNT {
            assert_eq!(get_bits2(register, port), port as u8);
        }
        register = with_bits2(register, 2, 0b11);
        assert_eq!(get_bits2(register, 1), 1);
        assert_eq!(get_bits2(register, 2), 3);
        assert_eq!(get_bits2(register, 3), 3);
    }

    #[test]
    fn done_bits_count_down_from_three() {
        assert_eq!(done_bit(0), 0b1000);
        assert_eq!(done_bit(3), 0b0001);
    }

    #[test]
    fn pid_windows_do_not_overlap_goals() {
        let (_, last) = pid_gain(3, PidTerm::D);
        assert_eq!(last + 2, REG_W_MOT_0_GOAL_B3);
        assert_eq!(motor_position_goal(3) + 4, REG_ALL_COUNT);
    }

    #[test]
    fn fresh_file_reports_version() {
        assert_eq!(RegisterFile::new().version(), SPI_VERSION);
        assert!(RegisterFile::from_bytes(vec![0; 10]).is_none());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn reading_past_the_end_panics() {
        RegisterFile::new().get_i32(REG_ALL_COUNT - 2);
    }
}
