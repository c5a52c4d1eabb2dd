//! # SBUS Protocol Module
//!
//! Implementation of the SBUS radio-control protocol.
//!
//! This module handles:
//! - Frame recovery from a raw byte stream with timeout-based resynchronisation
//! - 16-channel, 11-bit unpacking and failsafe/frame-lost flags
//! - Mapping channels to drive commands
//! - Frame encoding for the simulated receiver

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod mapper;
