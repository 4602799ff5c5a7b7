//! Cache-busted feed requests

use reqwest::Url;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues cache-bust tokens: wall-clock milliseconds, bumped so that every
/// token is strictly greater than the previous one for the whole session.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> u64 {
        self.next_token_at(chrono::Utc::now().timestamp_millis())
    }

    /// Token for a given clock reading. A clock that stalls or steps back
    /// still yields increasing tokens.
    pub fn next_token_at(&self, now_ms: i64) -> u64 {
        let now = now_ms.max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(prev.saturating_add(1))
    }

    pub fn last_token(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

/// One frame fetch: base URL plus the token that makes it unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub base_url: Url,
    pub token: u64,
}

impl FeedRequest {
    pub fn new(base_url: Url, token: u64) -> Self {
        Self { base_url, token }
    }

    /// Resolve the request URL. Existing query pairs are kept; a stale value
    /// for `param` is replaced.
    pub fn url(&self, param: &str) -> Url {
        let mut url = self.base_url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(param, &self.token.to_string());
        url
    }
}
