//! Feed Synchronizer
//!
//! Presents a pull-based device image endpoint as a live feed:
//! - Fixed-interval re-fetch with a unique cache-bust token per request
//! - Connection state machine driven only by load success/failure
//! - Single owned refresh timer, cancelled before every restart and on drop
//!
//! The state machine does not care how frames arrive. [`FrameSource`] is the
//! seam: [`HttpFrameSource`] polls single images or reads the first part of a
//! `multipart/x-mixed-replace` stream.

pub mod request;
pub mod source;
pub mod state;
pub mod sync;

pub use request::{CacheBuster, FeedRequest};
pub use source::{FeedLoadError, Frame, FrameSource, HttpFrameSource, DEFAULT_MAX_FRAME_BYTES};
pub use state::{ConnectionState, FeedEvent};
pub use sync::{FeedConfig, FeedSynchronizer, FeedView};
