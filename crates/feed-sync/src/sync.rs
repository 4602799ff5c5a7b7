//! Feed Synchronizer
//!
//! Owns the refresh timer and publishes a [`FeedView`] through a watch
//! channel. Each tick issues one cache-busted load; loads run concurrently
//! with the timer so a slow frame never delays the cadence. Results are
//! applied newest-token-wins, so an overtaken load cannot roll the view back.

use crate::request::{CacheBuster, FeedRequest};
use crate::source::{FeedLoadError, Frame, FrameSource};
use crate::state::{ConnectionState, FeedEvent};
use aeris_core::TimerSlot;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Default refresh interval (10 fetches/sec)
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Interval floor; anything shorter is clamped up
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub const DEFAULT_CACHE_BUST_PARAM: &str = "t";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: Url,
    pub interval: Duration,
    pub cache_bust_param: String,
}

impl FeedConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            interval: DEFAULT_INTERVAL,
            cache_bust_param: DEFAULT_CACHE_BUST_PARAM.to_string(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Blank names are ignored and keep the current parameter
    pub fn with_cache_bust_param(mut self, param: impl Into<String>) -> Self {
        let param = param.into();
        if !param.trim().is_empty() {
            self.cache_bust_param = param;
        }
        self
    }
}

/// Everything the presentation layer needs about the feed
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedView {
    pub connection: ConnectionState,
    /// URI of the frame currently on screen
    pub image_uri: Option<String>,
    /// URI of the most recently issued request
    pub requested_uri: Option<String>,
    /// Token of the newest applied result
    pub frame_token: Option<u64>,
    pub frames_loaded: u64,
    pub frames_failed: u64,
    pub last_error: Option<String>,
    pub last_frame_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub frame: Option<Arc<Frame>>,
}

impl FeedView {
    /// Apply one load outcome. Returns `false` (and changes nothing) when a
    /// newer result has already been applied.
    pub fn apply(&mut self, token: u64, uri: &Url, outcome: Result<Frame, FeedLoadError>) -> bool {
        if self.frame_token.is_some_and(|applied| token <= applied) {
            return false;
        }
        self.frame_token = Some(token);

        match outcome {
            Ok(frame) => {
                self.connection = self.connection.next(FeedEvent::FrameLoaded);
                self.frames_loaded += 1;
                self.image_uri = Some(uri.to_string());
                self.frame = Some(Arc::new(frame));
                self.last_frame_at = Some(Utc::now());
                self.last_error = None;
            }
            Err(err) => {
                self.connection = self.connection.next(FeedEvent::FrameFailed);
                self.frames_failed += 1;
                self.last_error = Some(err.to_string());
            }
        }
        true
    }
}

/// Periodic frame fetcher with one owned timer
pub struct FeedSynchronizer<S: FrameSource> {
    worker: FeedWorker<S>,
    timer: TimerSlot,
}

impl<S: FrameSource> FeedSynchronizer<S> {
    pub fn new(config: FeedConfig, source: S) -> Self {
        let (view, _) = watch::channel(FeedView::default());
        Self {
            worker: FeedWorker {
                config: Arc::new(config),
                source: Arc::new(source),
                view: Arc::new(view),
                buster: Arc::new(CacheBuster::new()),
            },
            timer: TimerSlot::new("feed-refresh"),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.worker.config
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.worker.view.subscribe()
    }

    pub fn view(&self) -> FeedView {
        self.worker.view.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.worker.view.borrow().connection
    }

    /// Start (or restart) the refresh timer. A running timer is cancelled
    /// first, together with its in-flight loads.
    pub fn start(&mut self) {
        info!(
            url = %self.worker.config.base_url,
            interval_ms = self.worker.config.interval.as_millis() as u64,
            "Starting feed synchronizer"
        );
        self.timer.arm(self.worker.clone().run());
    }

    /// Cancel the refresh timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.timer.cancel() {
            info!("Feed synchronizer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    /// Run a single load attempt inline, outside the timer
    pub async fn refresh(&self) -> ConnectionState {
        let request = self.worker.next_request();
        self.worker.clone().attempt(request).await;
        self.connection()
    }
}

struct FeedWorker<S> {
    config: Arc<FeedConfig>,
    source: Arc<S>,
    view: Arc<watch::Sender<FeedView>>,
    buster: Arc<CacheBuster>,
}

impl<S> Clone for FeedWorker<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            source: self.source.clone(),
            view: self.view.clone(),
            buster: self.buster.clone(),
        }
    }
}

impl<S: FrameSource> FeedWorker<S> {
    fn next_request(&self) -> FeedRequest {
        FeedRequest::new(self.config.base_url.clone(), self.buster.next_token())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Dropping the set (timer cancelled) aborts every in-flight load
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let request = self.next_request();
                    in_flight.spawn(self.clone().attempt(request));
                }
                Some(joined) = in_flight.join_next() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!("Frame load task panicked: {}", err);
                        }
                    }
                }
            }
        }
    }

    async fn attempt(self, request: FeedRequest) {
        let url = request.url(&self.config.cache_bust_param);
        self.view.send_modify(|view| view.requested_uri = Some(url.to_string()));

        let outcome = self.source.load(url.clone()).await;
        match &outcome {
            Ok(frame) => debug!(
                token = request.token,
                bytes = frame.bytes.len(),
                width = frame.width,
                height = frame.height,
                "Frame loaded"
            ),
            Err(err) => debug!(token = request.token, error = %err, "Frame load failed"),
        }

        self.view.send_if_modified(|view| {
            let before = view.connection;
            let applied = view.apply(request.token, &url, outcome);
            if applied && before != view.connection {
                info!(from = ?before, to = ?view.connection, "Feed connection state changed");
            }
            applied
        });
    }
}
