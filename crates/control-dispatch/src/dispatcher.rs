//! Control Dispatcher
//!
//! Slider changes update the shared speed cell before anything is sent, so
//! the rotation simulation follows the slider even when the device is slow
//! or unreachable.

use crate::command::{DeviceCommand, DispatchError};
use crate::link::DeviceLink;
use crate::throttle::DispatchThrottle;
use aeris_core::{ControlSnapshot, Direction, SharedSpeed};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent,
    /// Held back by the throttle; the latest value is flushed later
    Deferred,
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Serialize for DispatchError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of a slider change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderUpdate {
    /// Slider position re-derived from the stored speed
    pub slider: f64,
    pub speed_ms: f64,
    pub outcome: DispatchOutcome,
}

/// Throttle state and the held-back speed. Guarded by one async lock that
/// is also held for the duration of each send, so commands reach the device
/// in the order they were issued.
struct Outbox {
    throttle: DispatchThrottle,
    pending: Option<f64>,
}

pub struct ControlDispatcher<L> {
    link: L,
    speed: SharedSpeed,
    outbox: Mutex<Outbox>,
}

impl<L: DeviceLink> ControlDispatcher<L> {
    pub fn new(link: L, speed: SharedSpeed) -> Self {
        Self {
            link,
            speed,
            outbox: Mutex::new(Outbox {
                throttle: DispatchThrottle::unlimited(),
                pending: None,
            }),
        }
    }

    pub fn with_throttle(mut self, throttle: DispatchThrottle) -> Self {
        self.outbox.get_mut().throttle = throttle;
        self
    }

    pub fn speed(&self) -> &SharedSpeed {
        &self.speed
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        self.speed.snapshot()
    }

    pub async fn pending_speed(&self) -> Option<f64> {
        self.outbox.lock().await.pending
    }

    /// Map the slider to a speed and publish it, then send it to the device.
    ///
    /// The shared speed is stored before waiting on anything, so the
    /// rotation follows the slider even while an earlier command is still
    /// in flight.
    pub async fn set_slider(&self, slider: f64) -> SliderUpdate {
        let range = self.speed.range();
        let speed_ms = self.speed.store(range.slider_to_speed(slider));
        debug!(slider, speed_ms, "Speed updated");

        let mut outbox = self.outbox.lock().await;
        let outcome = if outbox.throttle.try_acquire(Instant::now()) {
            outbox.pending = None;
            self.send(DeviceCommand::SetSpeed(speed_ms)).await
        } else {
            outbox.pending = Some(speed_ms);
            DispatchOutcome::Deferred
        };

        SliderUpdate {
            slider: range.speed_to_slider(speed_ms),
            speed_ms,
            outcome,
        }
    }

    /// Send the held-back speed if the throttle window has reopened.
    /// Returns `None` when there was nothing to send or the window is closed.
    pub async fn flush_pending(&self) -> Option<DispatchOutcome> {
        let mut outbox = self.outbox.lock().await;
        let speed_ms = outbox.pending?;
        if !outbox.throttle.try_acquire(Instant::now()) {
            return None;
        }
        outbox.pending = None;
        Some(self.send(DeviceCommand::SetSpeed(speed_ms)).await)
    }

    /// One press, one command
    pub async fn press(&self, direction: Direction) -> Result<(), DispatchError> {
        let _outbox = self.outbox.lock().await;
        match self.send(DeviceCommand::Move(direction)).await {
            DispatchOutcome::Failed(err) => Err(err),
            _ => Ok(()),
        }
    }

    async fn send(&self, command: DeviceCommand) -> DispatchOutcome {
        match self.link.send(command).await {
            Ok(()) => {
                debug!(%command, "Command sent");
                DispatchOutcome::Sent
            }
            Err(err) => {
                warn!(%command, error = %err, "Command dispatch failed");
                DispatchOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeris_core::SpeedRange;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct RecordingLink {
        sent: Mutex<Vec<DeviceCommand>>,
        fail_with: Mutex<Option<DispatchError>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl RecordingLink {
        fn failing(err: DispatchError) -> Self {
            Self {
                fail_with: Mutex::new(Some(err)),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<DeviceCommand> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl DeviceLink for RecordingLink {
        async fn send(&self, command: DeviceCommand) -> Result<(), DispatchError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.sent.lock().unwrap().push(command);
            match self.fail_with.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn gated() -> (Arc<RecordingLink>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let link = Arc::new(RecordingLink {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        (link, gate)
    }

    fn dispatcher(link: Arc<RecordingLink>) -> ControlDispatcher<Arc<RecordingLink>> {
        ControlDispatcher::new(link, SharedSpeed::new(SpeedRange::default(), 1000.0))
    }

    #[tokio::test]
    async fn test_slider_extremes() {
        let link = Arc::new(RecordingLink::default());
        let control = dispatcher(link.clone());

        let update = control.set_slider(0.0).await;
        assert_eq!(update.speed_ms, 5000.0);
        assert_eq!(update.outcome, DispatchOutcome::Sent);
        assert_eq!(control.speed().load(), 5000.0);

        let update = control.set_slider(100.0).await;
        assert_eq!(update.speed_ms, 500.0);
        assert_eq!(control.speed().load(), 500.0);

        assert_eq!(
            link.sent(),
            vec![DeviceCommand::SetSpeed(5000.0), DeviceCommand::SetSpeed(500.0)]
        );
    }

    #[tokio::test]
    async fn test_out_of_range_slider_reports_clamped_value() {
        let link = Arc::new(RecordingLink::default());
        let control = dispatcher(link);

        let update = control.set_slider(150.0).await;
        assert_eq!(update.slider, 100.0);
        assert_eq!(update.speed_ms, 500.0);
        assert_eq!(control.snapshot().slider, 100.0);
    }

    #[tokio::test]
    async fn test_speed_published_before_send_completes() {
        let (link, gate) = gated();
        let control = dispatcher(link.clone());
        let reader = control.speed().clone();

        let task = tokio::spawn(async move { control.set_slider(100.0).await });
        tokio::task::yield_now().await;

        // The rotation reader sees the new speed while the device is still busy
        assert_eq!(reader.load(), 500.0);
        assert!(link.sent().is_empty());

        gate.add_permits(1);
        let update = task.await.unwrap();
        assert_eq!(update.outcome, DispatchOutcome::Sent);
    }

    #[tokio::test]
    async fn test_slider_not_blocked_by_command_in_flight() {
        let (link, gate) = gated();
        let control = Arc::new(dispatcher(link.clone()));
        let reader = control.speed().clone();

        let press = tokio::spawn({
            let control = control.clone();
            async move { control.press(Direction::Up).await }
        });
        tokio::task::yield_now().await;

        let slider = tokio::spawn({
            let control = control.clone();
            async move { control.set_slider(100.0).await }
        });
        tokio::task::yield_now().await;

        // The press is still waiting on the device; the speed is already live
        assert_eq!(reader.load(), 500.0);
        assert!(link.sent().is_empty());

        gate.add_permits(2);
        press.await.unwrap().unwrap();
        assert_eq!(slider.await.unwrap().outcome, DispatchOutcome::Sent);

        // Sends still reach the device in issue order
        assert_eq!(
            link.sent(),
            vec![DeviceCommand::Move(Direction::Up), DeviceCommand::SetSpeed(500.0)]
        );
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_speed_kept() {
        let link = Arc::new(RecordingLink::failing(DispatchError::Unreachable(
            "connection refused".into(),
        )));
        let control = dispatcher(link.clone());

        let update = control.set_slider(50.0).await;
        assert!(update.outcome.is_failed());
        assert_eq!(control.speed().load(), 2750.0);
        assert_eq!(link.sent(), vec![DeviceCommand::SetSpeed(2750.0)]);

        // Next change is attempted normally; nothing is retried behind the scenes
        control.set_slider(0.0).await;
        assert_eq!(link.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_press_sends_one_command() {
        let link = Arc::new(RecordingLink::default());
        let control = dispatcher(link.clone());

        control.press(Direction::Up).await.unwrap();
        control.press(Direction::Left).await.unwrap();
        assert_eq!(
            link.sent(),
            vec![
                DeviceCommand::Move(Direction::Up),
                DeviceCommand::Move(Direction::Left)
            ]
        );
    }

    #[tokio::test]
    async fn test_press_failure_returned() {
        let link = Arc::new(RecordingLink::failing(DispatchError::Rejected(500)));
        let control = dispatcher(link);
        let speed_before = control.speed().load();

        assert_eq!(
            control.press(Direction::Down).await,
            Err(DispatchError::Rejected(500))
        );
        assert_eq!(control.speed().load(), speed_before);
    }

    #[tokio::test]
    async fn test_unthrottled_sends_every_value() {
        let link = Arc::new(RecordingLink::default());
        let control = dispatcher(link.clone());

        for step in 0..=10 {
            control.set_slider(step as f64 * 10.0).await;
        }
        assert_eq!(link.sent().len(), 11);
        assert_eq!(control.pending_speed().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_flushes_latest_value() {
        let link = Arc::new(RecordingLink::default());
        let control =
            dispatcher(link.clone()).with_throttle(DispatchThrottle::new(Duration::from_millis(100)));
        let range = SpeedRange::default();

        assert_eq!(control.set_slider(10.0).await.outcome, DispatchOutcome::Sent);
        assert_eq!(control.set_slider(20.0).await.outcome, DispatchOutcome::Deferred);
        let update = control.set_slider(30.0).await;
        assert_eq!(update.outcome, DispatchOutcome::Deferred);

        // Shared speed still follows every value
        assert_eq!(control.speed().load(), range.slider_to_speed(30.0));
        assert_eq!(control.flush_pending().await, None);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(control.flush_pending().await, Some(DispatchOutcome::Sent));
        assert_eq!(control.flush_pending().await, None);

        assert_eq!(
            link.sent(),
            vec![
                DeviceCommand::SetSpeed(range.slider_to_speed(10.0)),
                DeviceCommand::SetSpeed(range.slider_to_speed(30.0)),
            ]
        );
    }

    #[test]
    fn test_outcome_json() {
        assert_eq!(
            serde_json::to_value(DispatchOutcome::Sent).unwrap(),
            serde_json::json!({ "status": "sent" })
        );
        assert_eq!(
            serde_json::to_value(DispatchOutcome::Failed(DispatchError::Timeout)).unwrap(),
            serde_json::json!({ "status": "failed", "error": "Device did not respond in time" })
        );
    }
}
