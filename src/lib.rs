//! # Robofish Library
//!
//! Control core for a servo-actuated robotic fish.
//!
//! This library decodes an SBUS radio stream and a JY901 IMU stream from
//! ring-buffered receive channels, maps the sticks to drive commands, and runs
//! the gait state machine that produces body and tail servo angles.

pub mod config;
pub mod error;
pub mod gait;
pub mod imu;
pub mod ring;
pub mod sbus;
pub mod serial;
pub mod servo;
pub mod sim;
pub mod tasks;
pub mod telemetry;
