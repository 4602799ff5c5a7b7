//! Speed Range
//!
//! Device speed is an actuator period: milliseconds per full revolution.
//! The user-facing slider is a percentage mapped inversely onto that period,
//! so 100% selects the shortest period (fastest rotation).
//!
//! ```text
//! speed = max - (slider / 100) * (max - min)      clamped to [0, max]
//! ```

use crate::{SLIDER_MAX, SLIDER_MIN};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Slowest period of the sampled device (slider at 0%)
pub const DEFAULT_MAX_SPEED_MS: f64 = 5000.0;

/// Fastest period of the sampled device (slider at 100%)
pub const DEFAULT_MIN_SPEED_MS: f64 = 500.0;

/// Period bounds for one device model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    min_ms: f64,
    max_ms: f64,
}

impl SpeedRange {
    /// Build a range, sanitizing the bounds instead of rejecting them.
    ///
    /// Non-finite bounds fall back to the sampled defaults, negative bounds
    /// are raised to zero and inverted bounds are swapped.
    pub fn new(min_ms: f64, max_ms: f64) -> Self {
        let min_ms = if min_ms.is_finite() { min_ms.max(0.0) } else { DEFAULT_MIN_SPEED_MS };
        let max_ms = if max_ms.is_finite() { max_ms.max(0.0) } else { DEFAULT_MAX_SPEED_MS };

        if min_ms > max_ms {
            Self { min_ms: max_ms, max_ms: min_ms }
        } else {
            Self { min_ms, max_ms }
        }
    }

    pub fn min_ms(&self) -> f64 {
        self.min_ms
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ms
    }

    /// Width of the slider-addressable part of the range
    pub fn span_ms(&self) -> f64 {
        self.max_ms - self.min_ms
    }

    /// Map a slider percentage onto a device period
    pub fn slider_to_speed(&self, slider: f64) -> f64 {
        let slider = sanitize_slider(slider);
        let speed = self.max_ms - (slider / SLIDER_MAX) * self.span_ms();
        speed.clamp(0.0, self.max_ms)
    }

    /// Inverse of [`slider_to_speed`](Self::slider_to_speed)
    pub fn speed_to_slider(&self, speed_ms: f64) -> f64 {
        let span = self.span_ms();
        if span <= 0.0 {
            return SLIDER_MIN;
        }

        let speed = self.clamp_speed(speed_ms);
        ((self.max_ms - speed) / span * SLIDER_MAX).clamp(SLIDER_MIN, SLIDER_MAX)
    }

    /// Clamp a raw period to `[0, max]`. NaN selects the slowest period.
    pub fn clamp_speed(&self, speed_ms: f64) -> f64 {
        if speed_ms.is_nan() {
            return self.max_ms;
        }
        speed_ms.clamp(0.0, self.max_ms)
    }
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPEED_MS, DEFAULT_MAX_SPEED_MS)
    }
}

fn sanitize_slider(slider: f64) -> f64 {
    if slider.is_nan() {
        SLIDER_MIN
    } else {
        slider.clamp(SLIDER_MIN, SLIDER_MAX)
    }
}

/// Slider/speed pair as shown to the user. The slider is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub slider: f64,
    pub speed_ms: f64,
}

/// Current device period, shared between the control dispatcher (writer)
/// and the rotation loop (reader).
///
/// Values are clamped on store, so readers never observe an out-of-range
/// period. Release/acquire ordering makes a store visible to the next load.
#[derive(Debug, Clone)]
pub struct SharedSpeed {
    bits: Arc<AtomicU64>,
    range: SpeedRange,
}

impl SharedSpeed {
    pub fn new(range: SpeedRange, initial_ms: f64) -> Self {
        let initial = range.clamp_speed(initial_ms);
        Self {
            bits: Arc::new(AtomicU64::new(initial.to_bits())),
            range,
        }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Store a new period, returning the clamped value actually stored
    #[inline]
    pub fn store(&self, speed_ms: f64) -> f64 {
        let speed = self.range.clamp_speed(speed_ms);
        self.bits.store(speed.to_bits(), Ordering::Release);
        speed
    }

    pub fn range(&self) -> SpeedRange {
        self.range
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let speed_ms = self.load();
        ControlSnapshot {
            slider: self.range.speed_to_slider(speed_ms),
            speed_ms,
        }
    }
}
