//! # Gait Module
//!
//! Turns discrete drive commands into continuous body and tail servo angles.
//!
//! This module handles:
//! - Forward swimming with a phase-lagged body/tail sine pair
//! - Two-phase turns (eased preparation, then one blended swing half-cycle)
//! - Command latching while a turn is running
//! - Angle clamping to the servo range

pub mod controller;

pub use controller::{GaitController, GaitMode, GaitSnapshot, ServoAngles, TurnPhase};
