//! Configuration for the playback loop.

use std::time::Duration;

use super::sink::{DEFAULT_PLAYER, DEFAULT_PLAYER_ARGS};
use crate::retry::RetryPolicy;

/// Default time buffering may go without progress before the video stalls.
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 5;

/// Configuration for [`super::PlaybackLoop`].
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Retries per index and their backoff (3 retries, `1s * retry`).
    pub retry_policy: RetryPolicy,

    /// Buffering without progress for this long stalls the video.
    pub stall_timeout: Duration,

    /// Hint the sink about the next entry once a video starts.
    pub prefetch_next: bool,

    /// Player program for the external player sink.
    pub player: String,

    /// Player arguments, placed before the source location.
    pub player_args: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::playback_default(),
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
            prefetch_next: true,
            player: DEFAULT_PLAYER.to_string(),
            player_args: DEFAULT_PLAYER_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl PlaybackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets retries per index with linear backoff `delay * retry`.
    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.retry_policy = RetryPolicy::linear(max_retries, delay);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_prefetch_next(mut self, enabled: bool) -> Self {
        self.prefetch_next = enabled;
        self
    }

    pub fn with_player(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.player = program.into();
        self.player_args = args;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.retry_policy.max_retries(), 3);
        assert_eq!(
            config.retry_policy.delay_for_retry(2),
            Some(Duration::from_secs(2))
        );
        assert_eq!(config.stall_timeout, Duration::from_secs(5));
        assert_eq!(config.player, "mpv");
        assert!(config.player_args.contains(&"--fs".to_string()));
    }

    #[test]
    fn test_with_retries() {
        let config = PlaybackConfig::new().with_retries(5, Duration::from_millis(200));
        assert_eq!(config.retry_policy.max_retries(), 5);
        assert_eq!(
            config.retry_policy.delay_for_retry(3),
            Some(Duration::from_millis(600))
        );
    }
}
