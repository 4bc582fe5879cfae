//! Reader configuration.

use crate::backoff::BackoffPolicy;
use crate::session::clamp_interval;
use std::time::Duration;

pub const DEFAULT_PARTS: &str = "id,snippet,authorDetails";

pub const MIN_MAX_RESULTS: u32 = 200;
pub const MAX_MAX_RESULTS: u32 = 2000;
pub const MIN_PROFILE_IMAGE_SIZE: u32 = 16;
pub const MAX_PROFILE_IMAGE_SIZE: u32 = 720;

/// Options shared by [`LiveChatPoller`](crate::LiveChatPoller) and
/// [`LiveChatStream`](crate::LiveChatStream).
///
/// Every setter clamps its input into the range the API accepts, so a `ChatOptions` is always
/// valid to send.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    parts: String,
    max_results: u32,
    profile_image_size: u32,
    min_poll_interval: Duration,
    max_poll_interval: Duration,
    default_poll_interval: Duration,
    backoff: BackoffPolicy,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            parts: DEFAULT_PARTS.to_string(),
            max_results: 500,
            profile_image_size: 88,
            min_poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(30),
            default_poll_interval: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ChatOptions {
    /// Resource parts to request. An empty list falls back to the default.
    pub fn with_parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        self.parts = if joined.is_empty() {
            DEFAULT_PARTS.to_string()
        } else {
            joined
        };
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(MIN_MAX_RESULTS, MAX_MAX_RESULTS);
        self
    }

    pub fn with_profile_image_size(mut self, size: u32) -> Self {
        self.profile_image_size = size.clamp(MIN_PROFILE_IMAGE_SIZE, MAX_PROFILE_IMAGE_SIZE);
        self
    }

    /// Bounds for the server-advised polling interval. `max` is raised to `min` if smaller.
    pub fn with_poll_interval_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_poll_interval = min;
        self.max_poll_interval = max.max(min);
        self.default_poll_interval = self.clamp_interval(None, self.default_poll_interval);
        self
    }

    /// Interval used before the server has advised one. Clamped into the bounds.
    pub fn with_default_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval = self.clamp_interval(None, interval);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn parts(&self) -> &str {
        &self.parts
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    pub fn profile_image_size(&self) -> u32 {
        self.profile_image_size
    }

    pub fn min_poll_interval(&self) -> Duration {
        self.min_poll_interval
    }

    pub fn max_poll_interval(&self) -> Duration {
        self.max_poll_interval
    }

    pub fn default_poll_interval(&self) -> Duration {
        self.default_poll_interval
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub(crate) fn clamp_interval(&self, hint_millis: Option<u64>, current: Duration) -> Duration {
        clamp_interval(
            hint_millis,
            current,
            self.min_poll_interval,
            self.max_poll_interval,
        )
    }
}
