//! Console configuration
//!
//! Every flag can also come from an `AERIS_*` environment variable. Numeric
//! values are sanitized downstream (clamped, non-finite replaced by
//! defaults); only unusable URLs are rejected here.

use aeris_core::{SpeedRange, DEFAULT_MAX_SPEED_MS, DEFAULT_MIN_SPEED_MS};
use clap::Parser;
use control_dispatch::link::{DEFAULT_DIRECTION_PATH, DEFAULT_SPEED_PATH};
use control_dispatch::{CommandEndpoints, DispatchThrottle};
use feed_sync::{FeedConfig, DEFAULT_MAX_FRAME_BYTES};
use reqwest::Url;
use rotation_sim::{RotationConfig, DEFAULT_FRAME_RATE_HZ};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid device URL {url:?}: {reason}")]
    DeviceUrl { url: String, reason: String },
    #[error("Device URL must use http or https, got {0:?}")]
    Scheme(String),
    #[error("Invalid feed path {path:?}: {reason}")]
    FeedPath { path: String, reason: String },
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "aeris-console",
    version,
    about = "Live feed, rotation preview and motion control for an Aeris device"
)]
pub struct Args {
    /// Device base URL, e.g. http://192.168.4.1
    #[arg(long, env = "AERIS_DEVICE_URL")]
    pub device_url: String,

    /// Feed endpoint, relative to the device URL or absolute
    #[arg(long, env = "AERIS_FEED_PATH", default_value = "/stream")]
    pub feed_path: String,

    /// Feed refresh interval in milliseconds
    #[arg(long, env = "AERIS_FEED_INTERVAL_MS", default_value_t = 100)]
    pub feed_interval_ms: u64,

    /// Query parameter carrying the cache-bust token
    #[arg(long, env = "AERIS_CACHE_BUST_PARAM", default_value = "t")]
    pub cache_bust_param: String,

    #[arg(long, env = "AERIS_FETCH_TIMEOUT_MS", default_value_t = 2000)]
    pub fetch_timeout_ms: u64,

    #[arg(long, env = "AERIS_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    #[arg(long, env = "AERIS_COMMAND_TIMEOUT_MS", default_value_t = 2000)]
    pub command_timeout_ms: u64,

    #[arg(long, env = "AERIS_DIRECTION_PATH", default_value = DEFAULT_DIRECTION_PATH)]
    pub direction_path: String,

    #[arg(long, env = "AERIS_SPEED_PATH", default_value = DEFAULT_SPEED_PATH)]
    pub speed_path: String,

    /// Fastest period (ms per revolution), slider at 100
    #[arg(long, env = "AERIS_MIN_SPEED_MS", default_value_t = DEFAULT_MIN_SPEED_MS)]
    pub min_speed_ms: f64,

    /// Slowest period (ms per revolution), slider at 0
    #[arg(long, env = "AERIS_MAX_SPEED_MS", default_value_t = DEFAULT_MAX_SPEED_MS)]
    pub max_speed_ms: f64,

    #[arg(long, env = "AERIS_INITIAL_SPEED_MS", default_value_t = 1000.0)]
    pub initial_speed_ms: f64,

    /// Rotation preview frame rate in Hz
    #[arg(long, env = "AERIS_FRAME_RATE", default_value_t = DEFAULT_FRAME_RATE_HZ)]
    pub frame_rate: f64,

    /// Minimum spacing between speed commands; 0 sends every value
    #[arg(long, env = "AERIS_DISPATCH_MIN_INTERVAL_MS", default_value_t = 0)]
    pub dispatch_min_interval_ms: u64,

    /// Presentation API listen address
    #[arg(long, env = "AERIS_LISTEN", default_value = "127.0.0.1:18700")]
    pub listen: SocketAddr,
}

/// Validated settings for each component
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed: FeedConfig,
    pub fetch_timeout: Duration,
    pub max_frame_bytes: usize,
    pub commands: CommandEndpoints,
    pub command_timeout: Duration,
    pub speed_range: SpeedRange,
    pub initial_speed_ms: f64,
    pub rotation: RotationConfig,
    pub dispatch_min_interval: Duration,
    pub listen: SocketAddr,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let device_url = parse_device_url(&args.device_url)?;
        let feed_url = device_url
            .join(&args.feed_path)
            .map_err(|e| ConfigError::FeedPath {
                path: args.feed_path.clone(),
                reason: e.to_string(),
            })?;

        let feed = FeedConfig::new(feed_url)
            .with_interval(Duration::from_millis(args.feed_interval_ms))
            .with_cache_bust_param(args.cache_bust_param);

        let commands = CommandEndpoints::new(device_url).with_paths(args.direction_path, args.speed_path);

        Ok(Self {
            feed,
            fetch_timeout: Duration::from_millis(args.fetch_timeout_ms.max(1)),
            max_frame_bytes: args.max_frame_bytes.max(1),
            commands,
            command_timeout: Duration::from_millis(args.command_timeout_ms.max(1)),
            speed_range: SpeedRange::new(args.min_speed_ms, args.max_speed_ms),
            initial_speed_ms: args.initial_speed_ms,
            rotation: RotationConfig::from_frame_rate(args.frame_rate),
            dispatch_min_interval: Duration::from_millis(args.dispatch_min_interval_ms),
            listen: args.listen,
        })
    }

    pub fn throttle(&self) -> DispatchThrottle {
        DispatchThrottle::new(self.dispatch_min_interval)
    }
}

fn parse_device_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::DeviceUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Scheme(other.to_string())),
    }
}
