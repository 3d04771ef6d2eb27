//! # wallaby-sim
//!
//! The simulation core of a virtual robot controller. It emulates the motor,
//! servo and sensor ports of an educational robotics controller on top of an
//! engine-agnostic physics scene.
//!
//! Each frame, a [`RobotBinding`] reads the robot's state through
//! [`Readable`], runs the firmware's motor control law against the measured
//! joint angles, samples its sensors and returns a batch of [`WriteCommand`]s.
//! The caller applies the batch to a [`Writable`] robot before the next frame,
//! for example a [`SharedRegistersRobot`] backed by the controller's register
//! layout.

pub mod binding;
pub mod command;
pub mod config;
pub mod control;
pub mod distance_sensor;
pub mod engine;
pub mod error;
pub mod light_sensor;
pub mod motor;
pub mod registers;
pub mod robot;
pub mod sensor;
pub mod shared_registers;
pub mod touch_sensor;

pub use binding::*;
pub use command::*;
pub use config::*;
pub use control::*;
pub use distance_sensor::*;
pub use engine::*;
pub use error::*;
pub use light_sensor::*;
pub use motor::*;
pub use robot::*;
pub use sensor::*;
pub use shared_registers::*;
pub use touch_sensor::*;
