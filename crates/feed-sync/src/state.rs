//! Connection State Machine
//!
//! ```text
//!              FrameLoaded                FrameFailed
//!  Connecting ─────────────▶ Live ───────────────────────▶ Lost
//!     ▲  │                    ▲                             │
//!     └──┘ FrameFailed        └──────── FrameLoaded ────────┘
//! ```
//!
//! `Connecting` and `Lost` form one "not live" bucket and render the same
//! overlay; `Lost` only records that the feed was live at some point.

use serde::{Deserialize, Serialize};

/// Overlay shown whenever the feed is not live
pub const NOT_LIVE_OVERLAY: &str = "Connecting to device...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Live,
    Lost,
}

/// Outcome of one frame-fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    FrameLoaded,
    FrameFailed,
}

impl ConnectionState {
    /// Transition on a fetch outcome. Total and idempotent: applying the
    /// same event twice gives the same state as applying it once.
    pub fn next(self, event: FeedEvent) -> Self {
        match (self, event) {
            (_, FeedEvent::FrameLoaded) => Self::Live,
            (Self::Connecting, FeedEvent::FrameFailed) => Self::Connecting,
            (Self::Live | Self::Lost, FeedEvent::FrameFailed) => Self::Lost,
        }
    }

    pub fn is_live(&self) -> bool {
        *self == Self::Live
    }

    /// Text for the loading overlay, `None` while live
    pub fn overlay_text(&self) -> Option<&'static str> {
        match self {
            Self::Live => None,
            Self::Connecting | Self::Lost => Some(NOT_LIVE_OVERLAY),
        }
    }
}
