//! Frame Sources
//!
//! A frame source performs one load attempt against a fully resolved URL and
//! reports success (a validated frame) or a [`FeedLoadError`].

use futures::StreamExt;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Response, Url};
use std::future::Future;
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Upper bound for one frame body (8 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// A decoded-header frame ready for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Why a frame load failed. Never fatal: the next tick retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedLoadError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Feed returned status {0}")]
    Status(u16),
    #[error("Frame decode failed: {0}")]
    Decode(String),
    #[error("Feed returned an empty body")]
    EmptyBody,
    #[error("Frame exceeds {0} bytes")]
    TooLarge(usize),
}

impl From<reqwest::Error> for FeedLoadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// One frame-load attempt per call
pub trait FrameSource: Send + Sync + 'static {
    fn load(&self, url: Url) -> impl Future<Output = Result<Frame, FeedLoadError>> + Send;
}

impl<T: FrameSource> FrameSource for Arc<T> {
    fn load(&self, url: Url) -> impl Future<Output = Result<Frame, FeedLoadError>> + Send {
        T::load(self, url)
    }
}

/// Polls the device's HTTP image endpoint
pub struct HttpFrameSource {
    client: reqwest::Client,
    max_frame_bytes: usize,
}

impl HttpFrameSource {
    /// Build a source with its own client. The timeout bounds each attempt.
    pub fn new(fetch_timeout: Duration, max_frame_bytes: usize) -> Result<Self, FeedLoadError> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .user_agent(concat!("aeris-console/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, max_frame_bytes))
    }

    pub fn with_client(client: reqwest::Client, max_frame_bytes: usize) -> Self {
        Self {
            client,
            max_frame_bytes: max_frame_bytes.max(1),
        }
    }

    async fn read_body(&self, response: Response) -> Result<Vec<u8>, FeedLoadError> {
        if let Some(len) = response.content_length() {
            if len > self.max_frame_bytes as u64 {
                return Err(FeedLoadError::TooLarge(self.max_frame_bytes));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.max_frame_bytes {
                return Err(FeedLoadError::TooLarge(self.max_frame_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    /// Read a `multipart/x-mixed-replace` stream until the first complete
    /// JPEG, then drop the connection.
    async fn read_first_part(&self, response: Response) -> Result<Vec<u8>, FeedLoadError> {
        let mut buf = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
            if let Some(range) = first_part(&buf) {
                trace!(bytes = range.len(), "Extracted multipart frame");
                return Ok(buf[range].to_vec());
            }
            if buf.len() > self.max_frame_bytes {
                return Err(FeedLoadError::TooLarge(self.max_frame_bytes));
            }
        }

        if buf.is_empty() {
            Err(FeedLoadError::EmptyBody)
        } else {
            Err(FeedLoadError::Decode("stream ended before a complete frame".to_string()))
        }
    }
}

impl FrameSource for HttpFrameSource {
    async fn load(&self, url: Url) -> Result<Frame, FeedLoadError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedLoadError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let multipart = content_type.as_deref().is_some_and(is_multipart);
        let bytes = if multipart {
            self.read_first_part(response).await?
        } else {
            self.read_body(response).await?
        };

        if bytes.is_empty() {
            return Err(FeedLoadError::EmptyBody);
        }

        let (width, height) = decode_dimensions(&bytes)?;
        let content_type = if multipart {
            Some("image/jpeg".to_string())
        } else {
            content_type
        };

        Ok(Frame {
            bytes,
            content_type,
            width,
            height,
        })
    }
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/")
}

/// Locate the first complete frame of a multipart body. The part's
/// `Content-Length` header wins when present; otherwise the JPEG is delimited
/// by walking its marker segments.
fn first_part(buf: &[u8]) -> Option<Range<usize>> {
    if let Some(body_start) = find(buf, b"\r\n\r\n", 0).map(|pos| pos + 4) {
        if let Some(len) = part_content_length(&buf[..body_start]) {
            let end = body_start.checked_add(len)?;
            return (buf.len() >= end).then_some(body_start..end);
        }
    }
    find_jpeg(buf)
}

fn part_content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Locate the first complete JPEG (SOI through EOI) in `buf`
fn find_jpeg(buf: &[u8]) -> Option<Range<usize>> {
    let start = find(buf, &JPEG_SOI, 0)?;
    let end = jpeg_end(buf, start)?;
    Some(start..end)
}

/// End (exclusive) of the JPEG starting at `soi`. Segment payloads are
/// skipped by length, so an embedded thumbnail's EOI is never mistaken for
/// the frame's. Falls back to the next EOI if the marker structure breaks.
fn jpeg_end(buf: &[u8], soi: usize) -> Option<usize> {
    let mut pos = soi + JPEG_SOI.len();
    loop {
        if *buf.get(pos)? != 0xFF {
            return find(buf, &JPEG_EOI, pos).map(|eoi| eoi + JPEG_EOI.len());
        }
        match *buf.get(pos + 1)? {
            // fill byte
            0xFF => pos += 1,
            0xD9 => return Some(pos + JPEG_EOI.len()),
            0x01 | 0xD0..=0xD7 => pos += 2,
            marker => {
                let len = u16::from_be_bytes([*buf.get(pos + 2)?, *buf.get(pos + 3)?]) as usize;
                pos += 2 + len;
                if marker == 0xDA {
                    pos = entropy_end(buf, pos)?;
                }
            }
        }
    }
}

/// Scan entropy-coded scan data up to the next real marker
fn entropy_end(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let ff = find(buf, &[0xFF], pos)?;
        match *buf.get(ff + 1)? {
            // stuffed zero, restart marker or fill
            0x00 | 0xD0..=0xD7 | 0xFF => pos = ff + 1,
            _ => return Some(ff),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Validate a frame by decoding its image header
fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), FeedLoadError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FeedLoadError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FeedLoadError::Decode(e.to_string()))
}
