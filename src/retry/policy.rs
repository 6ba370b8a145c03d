//! Attempt ceiling and backoff delay.

use std::time::Duration;

use serde::Deserialize;

use crate::error::RetryError;

/// Default number of physical attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay after a transport fault, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// How many times a call may be attempted and how long to wait after a
/// transport fault.
///
/// `max_attempts` is always at least 1. The delay applies only to transport
/// faults; an unauthorized response is retried immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRetryPolicy")]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Result<Self, RetryError> {
        if max_attempts == 0 {
            return Err(RetryError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            retry_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Serialized form, e.g. `{"max_attempts": 3, "retry_delay_ms": 50}`.
#[derive(Deserialize)]
#[serde(default)]
struct RawRetryPolicy {
    max_attempts: u32,
    retry_delay_ms: u64,
}

impl Default for RawRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = RetryError;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        RetryPolicy::new(raw.max_attempts, Duration::from_millis(raw.retry_delay_ms))
    }
}
