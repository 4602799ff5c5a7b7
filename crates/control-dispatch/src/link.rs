//! Device link
//!
//! The transport is a seam: the dispatcher only needs "send this command and
//! tell me whether it landed". [`HttpDeviceLink`] posts small JSON bodies to
//! the device's command endpoints.

use crate::command::{DeviceCommand, DispatchError};
use aeris_core::Direction;
use reqwest::Url;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DIRECTION_PATH: &str = "/move";
pub const DEFAULT_SPEED_PATH: &str = "/speed";

pub trait DeviceLink: Send + Sync + 'static {
    fn send(&self, command: DeviceCommand) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

impl<T: DeviceLink> DeviceLink for Arc<T> {
    fn send(&self, command: DeviceCommand) -> impl Future<Output = Result<(), DispatchError>> + Send {
        (**self).send(command)
    }
}

/// Where commands go on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEndpoints {
    pub base_url: Url,
    pub direction_path: String,
    pub speed_path: String,
}

impl CommandEndpoints {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            direction_path: DEFAULT_DIRECTION_PATH.to_string(),
            speed_path: DEFAULT_SPEED_PATH.to_string(),
        }
    }

    pub fn with_paths(mut self, direction_path: impl Into<String>, speed_path: impl Into<String>) -> Self {
        self.direction_path = direction_path.into();
        self.speed_path = speed_path.into();
        self
    }

    pub fn direction_url(&self) -> Result<Url, DispatchError> {
        endpoint(&self.base_url, &self.direction_path)
    }

    pub fn speed_url(&self) -> Result<Url, DispatchError> {
        endpoint(&self.base_url, &self.speed_path)
    }
}

/// Paths resolve under the base URL's own path, so `http://host/api` with
/// `/move` gives `http://host/api/move`.
fn endpoint(base: &Url, path: &str) -> Result<Url, DispatchError> {
    let mut root = base.clone();
    root.set_query(None);
    root.set_fragment(None);
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    root.join(path.trim_start_matches('/'))
        .map_err(|e| DispatchError::Client(format!("invalid command path {:?}: {}", path, e)))
}

#[derive(Serialize)]
struct DirectionBody {
    direction: Direction,
}

#[derive(Serialize)]
struct SpeedBody {
    speed: u64,
}

pub struct HttpDeviceLink {
    client: reqwest::Client,
    direction_url: Url,
    speed_url: Url,
}

impl HttpDeviceLink {
    pub fn new(endpoints: &CommandEndpoints, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aeris-console/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, endpoints)
    }

    pub fn with_client(client: reqwest::Client, endpoints: &CommandEndpoints) -> Result<Self, DispatchError> {
        Ok(Self {
            client,
            direction_url: endpoints.direction_url()?,
            speed_url: endpoints.speed_url()?,
        })
    }
}

impl DeviceLink for HttpDeviceLink {
    async fn send(&self, command: DeviceCommand) -> Result<(), DispatchError> {
        let request = match command {
            DeviceCommand::Move(direction) => self
                .client
                .post(self.direction_url.clone())
                .json(&DirectionBody { direction }),
            DeviceCommand::SetSpeed(speed_ms) => self.client.post(self.speed_url.clone()).json(&SpeedBody {
                speed: DeviceCommand::wire_speed(speed_ms),
            }),
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(%command, status = status.as_u16(), "Device answered");

        if !status.is_success() {
            return Err(DispatchError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = CommandEndpoints::new(url("http://192.168.4.1"));
        assert_eq!(endpoints.direction_url().unwrap().as_str(), "http://192.168.4.1/move");
        assert_eq!(endpoints.speed_url().unwrap().as_str(), "http://192.168.4.1/speed");
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let endpoints = CommandEndpoints::new(url("http://device.local/api?x=1"))
            .with_paths("control/move", "/control/speed");
        assert_eq!(
            endpoints.direction_url().unwrap().as_str(),
            "http://device.local/api/control/move"
        );
        assert_eq!(
            endpoints.speed_url().unwrap().as_str(),
            "http://device.local/api/control/speed"
        );
    }

    #[test]
    fn test_wire_bodies() {
        let body = serde_json::to_string(&DirectionBody {
            direction: Direction::Up,
        })
        .unwrap();
        assert_eq!(body, r#"{"direction":"up"}"#);

        let body = serde_json::to_string(&SpeedBody { speed: 2750 }).unwrap();
        assert_eq!(body, r#"{"speed":2750}"#);
    }
}
