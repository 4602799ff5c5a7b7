//! Timer Slots
//!
//! Owned handle for one periodic task. Arming a slot aborts whatever task it
//! held before, so a component can never run two copies of the same loop.
//! Dropping the slot aborts the task.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    /// Spawn `task` into this slot, cancelling the previous occupant first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel() {
            debug!(timer = self.name, "Replaced running timer");
        }
        self.handle = Some(tokio::spawn(task));
    }

    /// Abort the current task. Returns `true` if one was still running.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
