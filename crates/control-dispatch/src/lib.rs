//! Control Dispatch
//!
//! Turns UI gestures into device commands:
//! - Slider drag → speed (inverse-linear mapping) → shared speed cell, then
//!   a speed command to the device
//! - Directional press → one directional command
//!
//! Dispatch failures come back as values ([`DispatchOutcome`],
//! [`DispatchError`]) for the UI to report; they never touch the feed or the
//! rotation state.

pub mod command;
pub mod dispatcher;
pub mod link;
pub mod throttle;

pub use command::{DeviceCommand, DispatchError};
pub use dispatcher::{ControlDispatcher, DispatchOutcome, SliderUpdate};
pub use link::{CommandEndpoints, DeviceLink, HttpDeviceLink};
pub use throttle::DispatchThrottle;
