//! # IMU Module
//!
//! JY901 inertial measurement unit support.
//!
//! This module handles:
//! - Frame layout, unit scaling and the latest-value sample ([`protocol`])
//! - Checksum-gated stream decoding ([`decoder`])
//! - Frame building for the simulator ([`encoder`])
//! - Register write scripts for rate changes and calibration ([`setup`])

pub mod decoder;
pub mod encoder;
pub mod protocol;
pub mod setup;
