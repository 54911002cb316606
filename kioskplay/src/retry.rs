//! Retry policy shared by the sync scheduler and the playback loop.
//!
//! Every retry decision in the crate goes through a [`RetryPolicy`]: the sync
//! scheduler uses it to space out manifest polls after a failure, and the
//! playback loop uses it to decide whether a failed video is retried at the
//! same index or skipped.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use kioskplay::retry::RetryPolicy;
//!
//! // Playback: three retries, waiting 1s, 2s, 3s.
//! let policy = RetryPolicy::linear(3, Duration::from_secs(1));
//! assert_eq!(policy.delay_for_retry(2), Some(Duration::from_secs(2)));
//! assert_eq!(policy.delay_for_retry(4), None);
//! ```

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Retry budget that never runs out.
pub const UNBOUNDED: u32 = u32::MAX;

/// Default delay before retrying a failed manifest poll (5 seconds).
pub const DEFAULT_SYNC_RETRY_DELAY_SECS: u64 = 5;

/// Default number of retries for a video that fails to play.
pub const DEFAULT_PLAYBACK_MAX_RETRIES: u32 = 3;

/// Default base delay between playback retries (1 second).
pub const DEFAULT_PLAYBACK_RETRY_DELAY_MS: u64 = 1000;

/// Default maximum delay for exponential backoff (5 minutes).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 300;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How an operation handles transient failures.
///
/// Retries are numbered from 1: `delay_for_retry(1)` is the wait before the
/// first retry, after the initial attempt failed.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - give up immediately on error.
    None,

    /// Constant delay between retries.
    Fixed {
        /// Maximum number of retries after the initial attempt.
        max_retries: u32,
        /// Delay before every retry.
        delay: Duration,
    },

    /// Delay grows linearly with the retry number (`delay * retry`).
    Linear {
        /// Maximum number of retries after the initial attempt.
        max_retries: u32,
        /// Base delay, multiplied by the retry number.
        delay: Duration,
    },

    /// Exponential backoff capped at `max_delay`.
    ExponentialBackoff {
        /// Maximum number of retries after the initial attempt.
        max_retries: u32,
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Maximum delay cap.
        max_delay: Duration,
        /// Multiplier applied after each failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::None
    }
}

impl RetryPolicy {
    /// Creates a fixed-delay policy.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::Fixed { max_retries, delay }
    }

    /// Creates a linear backoff policy (`delay * retry`).
    pub fn linear(max_retries: u32, delay: Duration) -> Self {
        Self::Linear { max_retries, delay }
    }

    /// Creates an exponential backoff policy with the default cap and multiplier.
    pub fn exponential(max_retries: u32, initial_delay: Duration) -> Self {
        Self::ExponentialBackoff {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Policy used for manifest polls: retry forever every `delay`.
    pub fn sync_default() -> Self {
        Self::fixed(
            UNBOUNDED,
            Duration::from_secs(DEFAULT_SYNC_RETRY_DELAY_SECS),
        )
    }

    /// Policy used for playback: three retries with `1s * retry` backoff.
    pub fn playback_default() -> Self {
        Self::linear(
            DEFAULT_PLAYBACK_MAX_RETRIES,
            Duration::from_millis(DEFAULT_PLAYBACK_RETRY_DELAY_MS),
        )
    }

    /// Calculates the delay before the given retry.
    ///
    /// # Arguments
    ///
    /// * `retry` - The retry number (1-based)
    ///
    /// # Returns
    ///
    /// The delay to wait, or `None` when the retry budget is exhausted.
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries() {
            return None;
        }

        match self {
            Self::None => None,
            Self::Fixed { delay, .. } => Some(*delay),
            Self::Linear { delay, .. } => Some(delay.saturating_mul(retry)),
            Self::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                // initial_delay * multiplier^(retry-1), capped before converting back
                let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
                let delay_ms = initial_delay.as_millis() as f64 * multiplier.powi(exponent);
                let capped = delay_ms.min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(capped as u64))
            }
        }
    }

    /// Returns the maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Fixed { max_retries, .. }
            | Self::Linear { max_retries, .. }
            | Self::ExponentialBackoff { max_retries, .. } => *max_retries,
        }
    }

    /// Returns the base delay of the policy (zero for [`RetryPolicy::None`]).
    pub fn base_delay(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay, .. } | Self::Linear { delay, .. } => *delay,
            Self::ExponentialBackoff { initial_delay, .. } => *initial_delay,
        }
    }
}
