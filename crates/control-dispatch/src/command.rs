//! Device commands and dispatch errors

use aeris_core::Direction;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    Move(Direction),
    /// Actuator period in milliseconds per revolution
    SetSpeed(f64),
}

impl DeviceCommand {
    /// Speed as sent on the wire: whole milliseconds
    pub fn wire_speed(speed_ms: f64) -> u64 {
        if speed_ms.is_finite() && speed_ms > 0.0 {
            speed_ms.round() as u64
        } else {
            0
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(direction) => write!(f, "move {}", direction),
            Self::SetSpeed(speed_ms) => write!(f, "speed {}", Self::wire_speed(*speed_ms)),
        }
    }
}

/// Command send failure. Non-fatal and never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Device unreachable: {0}")]
    Unreachable(String),
    #[error("Device did not respond in time")]
    Timeout,
    #[error("Device rejected command with status {0}")]
    Rejected(u16),
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_builder() {
            Self::Client(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}
