// tests/registers.rs
use proptest::prelude::*;
use wallaby_sim::registers::{self, PidTerm, RegisterFile};
use wallaby_sim::{
    Direction, InMemoryRobot, Mode, Motor, Readable, SERVO_MAX, Servo, SharedRegistersRobot,
    Stateless, WriteCommand, Writable, position_to_servo_register, servo_register_to_position,
    to_stateless,
};

fn synced(stateless: &Stateless) -> SharedRegistersRobot {
    let mut robot = SharedRegistersRobot::default();
    robot.sync(stateless);
    robot
}

#[test]
fn test_fresh_registers_carry_version() {
    let robot = SharedRegistersRobot::default();
    let bytes = robot.registers().as_bytes();
    assert_eq!(bytes.len(), registers::REG_ALL_COUNT);
    assert_eq!(&bytes[registers::REG_R_VERSION_H..=registers::REG_R_VERSION_L], &[0, 4]);
}

#[test]
fn test_nil_state_survives_registers() {
    let robot = synced(&Stateless::NIL);
    assert_eq!(to_stateless(&robot), Stateless::NIL);
}

#[test]
fn test_pwm_sign_lives_in_direction_bits() {
    let mut robot = synced(&Stateless::NIL);
    robot.apply(&[WriteCommand::MotorPwm { port: 1, pwm: -120 }]);

    let raw = robot.registers();
    assert_eq!(raw.get_u16(registers::motor_pwm(1)), 120);
    let dirs = raw.get_u8(registers::REG_RW_MOT_DIRS);
    assert_eq!(registers::get_bits2(dirs, 1), Direction::Backward.to_bits());
    // Motor 0 keeps its brake bits.
    assert_eq!(registers::get_bits2(dirs, 0), Direction::Brake.to_bits());

    let motor = robot.get_motor(1);
    assert_eq!(motor.pwm, -120);
    assert_eq!(motor.direction, Direction::Backward);
}

#[test]
fn test_done_bits_only_set_by_commands() {
    let mut state = Stateless::NIL;
    for motor in &mut state.motors {
        motor.done = false;
    }
    let mut robot = synced(&state);

    robot.apply(&[WriteCommand::MotorDone { port: 0, done: true }]);
    assert_eq!(robot.registers().get_u8(registers::REG_RW_MOT_DONE), 0b1000);

    robot.apply(&[
        WriteCommand::MotorDone { port: 0, done: false },
        WriteCommand::MotorDone { port: 3, done: true },
    ]);
    assert_eq!(robot.registers().get_u8(registers::REG_RW_MOT_DONE), 0b1001);
    assert!(robot.get_motor(0).done);
    assert!(!robot.get_motor(1).done);

    robot.sync(&state);
    assert_eq!(robot.registers().get_u8(registers::REG_RW_MOT_DONE), 0);
}

#[test]
fn test_positions_are_scaled() {
    let mut robot = synced(&Stateless::NIL);
    robot.apply(&[
        WriteCommand::AddMotorPosition {
            port: 2,
            position_delta: 7,
        },
        WriteCommand::AddMotorPosition {
            port: 2,
            position_delta: -3,
        },
    ]);
    assert_eq!(robot.registers().get_i32(registers::motor_position(2)), 4 * 250);
    assert_eq!(robot.get_motor(2).position, 4);

    robot.apply(&[WriteCommand::MotorPosition {
        port: 2,
        position: -900,
    }]);
    assert_eq!(robot.get_motor(2).position, -900);
}

#[test]
fn test_digital_and_analog_ports() {
    let mut robot = synced(&Stateless::NIL);
    robot.apply(&[
        WriteCommand::DigitalIn { port: 0, value: true },
        WriteCommand::DigitalIn { port: 5, value: true },
        WriteCommand::Analog { port: 4, value: 3210 },
    ]);
    assert_eq!(robot.registers().get_u8(registers::REG_RW_DIG_IN_H), 0b10_0001);
    assert!(robot.get_digital_value(5));
    assert!(!robot.get_digital_value(1));
    assert_eq!(robot.get_analog_value(4), 3210);

    robot.apply(&[WriteCommand::DigitalIn { port: 0, value: false }]);
    assert_eq!(robot.registers().get_u8(registers::REG_RW_DIG_IN_H), 0b10_0000);
}

#[test]
fn test_servo_disable_bits() {
    let mut state = Stateless::NIL;
    state.servos[1] = Servo {
        enabled: true,
        position: 1500,
    };
    let robot = synced(&state);

    let all_stop = robot.registers().get_u8(registers::REG_RW_MOT_SRV_ALLSTOP);
    assert_eq!(all_stop, 0b1101_0000);
    assert!(robot.get_servo(1).enabled);
    assert!(!robot.get_servo(0).enabled);
}

#[test]
fn test_pid_gains_truncate_to_thousandths() {
    let mut state = Stateless::NIL;
    state.motors[0].k_p = 0.0019;
    state.motors[0].k_i = -0.5;
    state.motors[0].k_d = 100.0;
    let robot = synced(&state);

    let motor = robot.get_motor(0);
    assert_eq!(motor.k_p, 0.001);
    assert_eq!(motor.k_i, 0.0);
    assert_eq!(motor.k_d, 65.535);
    assert_eq!(robot.registers().get_u16(registers::pid_gain(0, PidTerm::P).0), 1);
}

#[test]
fn test_servo_pulse_scale() {
    assert_eq!(position_to_servo_register(0), 600);
    assert_eq!(position_to_servo_register(SERVO_MAX), 2400);
    assert_eq!(servo_register_to_position(1500), 1024);
    assert_eq!(servo_register_to_position(100), 0);
    assert_eq!(servo_register_to_position(9000), SERVO_MAX);
}

#[test]
fn test_raw_bytes_round_trip() {
    let mut state = Stateless::NIL;
    state.analog_values = [1, 2, 3, 4, 5, 6];
    let robot = synced(&state);

    let copy = RegisterFile::from_bytes(robot.registers().snapshot()).unwrap();
    let reader = SharedRegistersRobot::new(copy);
    assert_eq!(to_stateless(&reader), state);
}

#[test]
fn test_adapters_agree_on_commands() {
    let batch = [
        WriteCommand::AddMotorPosition {
            port: 0,
            position_delta: 12,
        },
        WriteCommand::MotorPwm { port: 0, pwm: -50 },
        WriteCommand::MotorDone { port: 1, done: true },
        WriteCommand::MotorPwm { port: 2, pwm: 30 },
        WriteCommand::MotorDirection {
            port: 2,
            direction: Direction::Idle,
        },
        WriteCommand::MotorPosition {
            port: 3,
            position: -77,
        },
        WriteCommand::Analog { port: 2, value: 4095 },
        WriteCommand::DigitalIn { port: 3, value: true },
    ];

    let mut memory = InMemoryRobot::new();
    let mut shared = synced(&Stateless::NIL);
    memory.apply(&batch);
    shared.apply(&batch);

    assert_eq!(to_stateless(&shared), *memory.state());
}

#[test]
#[should_panic(expected = "out of range")]
fn test_out_of_range_motor_port_panics() {
    let mut robot = SharedRegistersRobot::default();
    robot.apply(&[WriteCommand::MotorPwm { port: 4, pwm: 1 }]);
}

fn mode() -> impl Strategy<Value = Mode> {
    (0u8..4).prop_map(Mode::from_bits)
}

prop_compose! {
    fn motor()(
        mode in mode(),
        brake in any::<bool>(),
        position in -(i32::MAX / 250)..=(i32::MAX / 250),
        pwm in -400i16..=400,
        done in any::<bool>(),
        position_goal in -(i32::MAX / 250)..=(i32::MAX / 250),
        speed_goal in any::<i16>(),
        gains in prop::array::uniform3(0u16..=u16::MAX),
    ) -> Motor {
        let direction = if brake && pwm == 0 { Direction::Brake } else { Direction::from_pwm(pwm) };
        Motor {
            mode,
            direction,
            position,
            pwm,
            done,
            position_goal,
            speed_goal,
            k_p: f64::from(gains[0]) / 1000.0,
            k_i: f64::from(gains[1]) / 1000.0,
            k_d: f64::from(gains[2]) / 1000.0,
        }
    }
}

proptest! {
    #[test]
    fn motor_fields_round_trip(motors in prop::array::uniform4(motor())) {
        let mut state = Stateless::NIL;
        state.motors = motors;
        let robot = synced(&state);
        let without_gains = |motor: Motor| Motor { k_p: 0.0, k_i: 0.0, k_d: 0.0, ..motor };
        for (port, expected) in motors.iter().enumerate() {
            let read = robot.get_motor(port);
            prop_assert_eq!(without_gains(read), without_gains(*expected));
            // Truncation may drop one thousandth when `g / 1000 * 1000` lands just below `g`.
            for (got, want) in [(read.k_p, expected.k_p), (read.k_i, expected.k_i), (read.k_d, expected.k_d)] {
                prop_assert!((0.0..=0.001 + 1e-9).contains(&(want - got)));
            }
        }
    }

    #[test]
    fn negative_speed_goals_round_trip(speed_goal in i16::MIN..0) {
        let mut state = Stateless::NIL;
        state.motors[3].speed_goal = speed_goal;
        let robot = synced(&state);
        prop_assert_eq!(robot.get_motor(3).speed_goal, speed_goal);
    }

    #[test]
    fn servo_positions_round_trip_within_one(position in 0u16..=SERVO_MAX, enabled in any::<bool>()) {
        let mut state = Stateless::NIL;
        state.servos[2] = Servo { enabled, position };
        let servo = synced(&state).get_servo(2);
        prop_assert_eq!(servo.enabled, enabled);
        prop_assert!((i32::from(servo.position) - i32::from(position)).abs() <= 1);
    }

    #[test]
    fn io_values_round_trip(
        analog in prop::array::uniform6(any::<u16>()),
        digital in prop::array::uniform6(any::<bool>()),
    ) {
        let mut state = Stateless::NIL;
        state.analog_values = analog;
        state.digital_values = digital;
        let robot = synced(&state);
        let read = to_stateless(&robot);
        prop_assert_eq!(read.analog_values, analog);
        prop_assert_eq!(read.digital_values, digital);
    }
}
