//! Angle math
//!
//! ```text
//! angle' = (angle + (elapsed / period) * 360) mod 360
//! ```

use serde::{Deserialize, Serialize};

pub const FULL_TURN_DEG: f64 = 360.0;

/// Simulated rotational position, always in `[0, 360)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngleState {
    degrees: f64,
}

impl AngleState {
    pub fn new(degrees: f64) -> Self {
        Self {
            degrees: normalize(degrees),
        }
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    pub fn radians(&self) -> f64 {
        self.degrees.to_radians()
    }

    /// Position after `elapsed_ms` at `period_ms` per revolution
    pub fn advanced(self, elapsed_ms: f64, period_ms: f64) -> Self {
        Self {
            degrees: advance(self.degrees, elapsed_ms, period_ms),
        }
    }
}

/// Advance an angle. A non-positive or non-finite period means "stopped"
/// and leaves the angle unchanged, as does a non-positive elapsed time.
pub fn advance(degrees: f64, elapsed_ms: f64, period_ms: f64) -> f64 {
    let running = period_ms.is_finite() && period_ms > 0.0;
    let elapsed = elapsed_ms.is_finite() && elapsed_ms > 0.0;
    if !running || !elapsed {
        return normalize(degrees);
    }
    normalize(degrees + (elapsed_ms / period_ms) * FULL_TURN_DEG)
}

fn normalize(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(FULL_TURN_DEG);
    // rem_euclid can round tiny negatives up to exactly 360
    if wrapped >= FULL_TURN_DEG {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_revolution_wraps_to_zero() {
        assert_eq!(advance(0.0, 1000.0, 1000.0), 0.0);
    }

    #[test]
    fn test_quarter_turn() {
        assert_eq!(advance(0.0, 250.0, 1000.0), 90.0);
        assert_eq!(advance(300.0, 250.0, 1000.0), 30.0);
    }

    #[test]
    fn test_zero_speed_is_stopped() {
        assert_eq!(advance(123.0, 5000.0, 0.0), 123.0);
        assert_eq!(advance(123.0, 5000.0, -10.0), 123.0);
        assert_eq!(advance(123.0, 5000.0, f64::NAN), 123.0);
    }

    #[test]
    fn test_normalize_edges() {
        assert_eq!(AngleState::new(-90.0).degrees(), 270.0);
        assert_eq!(AngleState::new(720.0).degrees(), 0.0);
        assert_eq!(AngleState::new(-1e-20).degrees(), 0.0);
        assert_eq!(AngleState::new(f64::NAN).degrees(), 0.0);
    }

    fn circular_gap(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(FULL_TURN_DEG);
        d.min(FULL_TURN_DEG - d)
    }

    proptest! {
        #[test]
        fn fuzz_angle_always_in_range(
            start in 0.0f64..360.0,
            elapsed in 0.0f64..1.0e7,
            period in prop_oneof![Just(0.0f64), 1.0f64..1.0e5],
        ) {
            let angle = advance(start, elapsed, period);
            prop_assert!((0.0..FULL_TURN_DEG).contains(&angle));
        }

        #[test]
        fn fuzz_advance_matches_formula(
            start in 0.0f64..360.0,
            elapsed in 0.0f64..1.0e6,
            period in 1.0f64..1.0e5,
        ) {
            let expected = (start + (elapsed / period) * 360.0).rem_euclid(360.0);
            let angle = advance(start, elapsed, period);
            prop_assert!(circular_gap(angle, expected) < 1e-6);
        }

        #[test]
        fn fuzz_stopped_never_moves(start in 0.0f64..360.0, elapsed in 0.0f64..1.0e7) {
            prop_assert_eq!(advance(start, elapsed, 0.0), start);
        }
    }
}
