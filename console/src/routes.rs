//! Presentation API
//!
//! - GET /view: connection state, overlay, feed stats, angle, slider/speed
//! - GET /frame: latest frame bytes
//! - PUT /slider: move the speed slider
//! - POST /direction/:dir: one directional command

use aeris_core::{ControlSnapshot, Direction, SharedSpeed};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use control_dispatch::{ControlDispatcher, DeviceLink, SliderUpdate};
use feed_sync::FeedView;
use rotation_sim::AngleState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

pub struct AppState<L> {
    pub feed: watch::Receiver<FeedView>,
    pub angle: watch::Receiver<AngleState>,
    pub speed: SharedSpeed,
    pub control: Arc<ControlDispatcher<L>>,
}

// Manual impl: L itself need not be Clone
impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            feed: self.feed.clone(),
            angle: self.angle.clone(),
            speed: self.speed.clone(),
            control: self.control.clone(),
        }
    }
}

// ========== Request/Response Types ==========

#[derive(Serialize)]
pub struct ViewResponse {
    #[serde(flatten)]
    pub feed: FeedView,
    /// Shown over the image while the feed is not live
    pub overlay: Option<&'static str>,
    pub angle_deg: f64,
    pub control: ControlSnapshot,
}

#[derive(Deserialize)]
pub struct SliderRequest {
    pub value: f64,
}

// ========== Route Handlers ==========

pub async fn view<L: DeviceLink>(State(state): State<AppState<L>>) -> Json<ViewResponse> {
    let feed = state.feed.borrow().clone();
    let overlay = feed.connection.overlay_text();

    Json(ViewResponse {
        feed,
        overlay,
        angle_deg: state.angle.borrow().degrees(),
        control: state.speed.snapshot(),
    })
}

/// Latest frame as received from the device
pub async fn frame<L: DeviceLink>(State(state): State<AppState<L>>) -> Response {
    let frame = state.feed.borrow().frame.clone();
    let Some(frame) = frame else {
        return (StatusCode::SERVICE_UNAVAILABLE, "No frame received yet").into_response();
    };

    let content_type = frame
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    (
        [(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "no-store".to_string())],
        Bytes::copy_from_slice(&frame.bytes),
    )
        .into_response()
}

pub async fn set_slider<L: DeviceLink>(
    State(state): State<AppState<L>>,
    Json(req): Json<SliderRequest>,
) -> Json<SliderUpdate> {
    Json(state.control.set_slider(req.value).await)
}

pub async fn press_direction<L: DeviceLink>(
    State(state): State<AppState<L>>,
    Path(raw): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let direction = raw
        .parse::<Direction>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .control
        .press(direction)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(serde_json::json!({
        "direction": direction,
        "status": "sent"
    })))
}

// ========== Router ==========

pub fn api_routes<L: DeviceLink>(state: AppState<L>) -> Router {
    Router::new()
        .route("/view", get(view::<L>))
        .route("/frame", get(frame::<L>))
        .route("/slider", put(set_slider::<L>))
        .route("/direction/:direction", post(press_direction::<L>))
        .with_state(state)
}
