//! Rotation Simulator
//!
//! Local simulation of the device actuator's rotation. The angle is a pure
//! function of elapsed time and the current speed (ms per revolution), so it
//! is independent of how often, or how irregularly, it is ticked.
//!
//! - [`AngleState`] and [`advance`]: the math, no clocks
//! - [`RotationIntegrator`]: wall-clock deltas, speed read fresh per tick
//! - [`RotationLoop`]: frame-paced driver publishing angles on a watch channel

pub mod angle;
pub mod frame_loop;
pub mod integrator;

pub use angle::{advance, AngleState, FULL_TURN_DEG};
pub use frame_loop::{RotationConfig, RotationLoop, DEFAULT_FRAME_RATE_HZ};
pub use integrator::RotationIntegrator;
