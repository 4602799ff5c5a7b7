//! Frame Loop
//!
//! Drives a [`RotationIntegrator`] at a best-effort frame cadence. Each frame
//! re-arms a single-shot sleep instead of using a fixed-rate interval: a late
//! frame is simply integrated over a longer delta, never replayed in a burst.

use crate::angle::AngleState;
use crate::integrator::RotationIntegrator;
use aeris_core::{SharedSpeed, TimerSlot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

pub const DEFAULT_FRAME_RATE_HZ: f64 = 60.0;

const MIN_FRAME_RATE_HZ: f64 = 1.0;
const MAX_FRAME_RATE_HZ: f64 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationConfig {
    pub frame_period: Duration,
}

impl RotationConfig {
    /// Frame rates outside 1..=240 Hz are clamped; non-finite rates use 60 Hz
    pub fn from_frame_rate(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 {
            hz.clamp(MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ)
        } else {
            DEFAULT_FRAME_RATE_HZ
        };
        Self {
            frame_period: Duration::from_secs_f64(1.0 / hz),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self::from_frame_rate(DEFAULT_FRAME_RATE_HZ)
    }
}

/// Owns the frame timer and publishes the simulated angle
pub struct RotationLoop {
    config: RotationConfig,
    speed: SharedSpeed,
    angle: Arc<watch::Sender<AngleState>>,
    timer: TimerSlot,
}

impl RotationLoop {
    pub fn new(config: RotationConfig, speed: SharedSpeed) -> Self {
        let (angle, _) = watch::channel(AngleState::default());
        Self {
            config,
            speed,
            angle: Arc::new(angle),
            timer: TimerSlot::new("rotation-frame"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AngleState> {
        self.angle.subscribe()
    }

    pub fn angle(&self) -> AngleState {
        *self.angle.borrow()
    }

    /// Start (or restart) the frame loop, continuing from the current angle.
    /// Time spent stopped is not integrated.
    pub fn start(&mut self) {
        let integrator = RotationIntegrator::new(self.speed.clone()).with_angle(self.angle());
        info!(
            frame_period_us = self.config.frame_period.as_micros() as u64,
            "Starting rotation loop"
        );
        self.timer
            .arm(run(integrator, self.config.frame_period, self.angle.clone()));
    }

    /// Stop re-arming frames. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.timer.cancel() {
            info!(angle_deg = self.angle().degrees(), "Rotation loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

async fn run(
    mut integrator: RotationIntegrator,
    frame_period: Duration,
    angle: Arc<watch::Sender<AngleState>>,
) {
    integrator.tick(Instant::now());
    loop {
        tokio::time::sleep(frame_period).await;
        let next = integrator.tick(Instant::now());
        angle.send_replace(next);
    }
}
