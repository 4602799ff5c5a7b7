//! Rotation Integrator
//!
//! Converts wall-clock ticks into angle updates. The speed cell is read on
//! every tick, so a new commanded speed changes the angular velocity from the
//! very next tick without any jump in position.

use crate::angle::AngleState;
use aeris_core::SharedSpeed;
use std::time::Duration;
use tokio::time::Instant;

pub struct RotationIntegrator {
    angle: AngleState,
    last_tick: Option<Instant>,
    speed: SharedSpeed,
}

impl RotationIntegrator {
    pub fn new(speed: SharedSpeed) -> Self {
        Self {
            angle: AngleState::default(),
            last_tick: None,
            speed,
        }
    }

    /// Resume from a known angle
    pub fn with_angle(mut self, angle: AngleState) -> Self {
        self.angle = angle;
        self
    }

    /// Advance to `now`. The first tick only records the baseline.
    pub fn tick(&mut self, now: Instant) -> AngleState {
        if let Some(last) = self.last_tick {
            self.step(now.saturating_duration_since(last));
        }
        self.last_tick = Some(now);
        self.angle
    }

    /// Advance by an explicit elapsed time
    pub fn step(&mut self, elapsed: Duration) -> AngleState {
        let period_ms = self.speed.load();
        self.angle = self.angle.advanced(elapsed.as_secs_f64() * 1000.0, period_ms);
        self.angle
    }

    pub fn angle(&self) -> AngleState {
        self.angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeris_core::SpeedRange;

    fn speed(ms: f64) -> SharedSpeed {
        SharedSpeed::new(SpeedRange::default(), ms)
    }

    #[test]
    fn test_one_period_is_one_revolution() {
        let mut integrator = RotationIntegrator::new(speed(1000.0));
        let angle = integrator.step(Duration::from_millis(1000));
        assert_eq!(angle.degrees(), 0.0);

        let angle = integrator.step(Duration::from_millis(500));
        assert_eq!(angle.degrees(), 180.0);
    }

    #[test]
    fn test_speed_change_is_read_fresh() {
        let cell = speed(1000.0);
        let mut integrator = RotationIntegrator::new(cell.clone());

        assert_eq!(integrator.step(Duration::from_millis(500)).degrees(), 180.0);

        // Half the angular velocity, no jump in position
        cell.store(2000.0);
        assert_eq!(integrator.step(Duration::from_millis(500)).degrees(), 270.0);
    }

    #[test]
    fn test_zero_speed_holds_angle() {
        let cell = speed(1000.0);
        let mut integrator = RotationIntegrator::new(cell.clone());
        integrator.step(Duration::from_millis(125));

        cell.store(0.0);
        let held = integrator.angle();
        assert_eq!(integrator.step(Duration::from_secs(10)), held);
    }

    #[test]
    fn test_irregular_ticks_match_single_tick() {
        let mut smooth = RotationIntegrator::new(speed(1200.0));
        let mut jittery = RotationIntegrator::new(speed(1200.0));

        smooth.step(Duration::from_millis(900));
        for ms in [5, 40, 16, 33, 300, 1, 505] {
            jittery.step(Duration::from_millis(ms));
        }

        assert!((smooth.angle().degrees() - jittery.angle().degrees()).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_uses_wall_clock_delta() {
        let mut integrator = RotationIntegrator::new(speed(1000.0));
        let start = Instant::now();

        assert_eq!(integrator.tick(start).degrees(), 0.0);
        let angle = integrator.tick(start + Duration::from_millis(250));
        assert_eq!(angle.degrees(), 90.0);
    }
}
