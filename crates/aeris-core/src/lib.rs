//! Aeris Core
//!
//! Device model shared by the feed, rotation and control crates:
//! - Speed range and the inverse-linear slider mapping
//! - Single-writer shared speed cell read by the rotation loop
//! - Directional command vocabulary
//! - Owned timer slots with cancel-before-restart semantics

pub mod direction;
pub mod speed;
pub mod timer;

pub use direction::{Direction, ParseDirectionError};
pub use speed::{ControlSnapshot, SharedSpeed, SpeedRange, DEFAULT_MAX_SPEED_MS, DEFAULT_MIN_SPEED_MS};
pub use timer::TimerSlot;

/// Slider scale, percent
pub const SLIDER_MIN: f64 = 0.0;
pub const SLIDER_MAX: f64 = 100.0;
