//! Retry with a fixed delay between attempts

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Blocking pause before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_secs: u64) -> Self {
        Self {
            max_retries,
            delay: Duration::from_secs(delay_secs),
        }
    }

    /// No retries at all
    #[cfg(test)]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Execute an operation, retrying every error up to the policy's limit
///
/// Returns the last error once retries are exhausted.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let mut retry = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if retry < policy.max_retries => {
                retry += 1;
                log::warn!(
                    "{what} failed: {e}. Retry {retry}/{} in {}s",
                    policy.max_retries,
                    policy.delay.as_secs()
                );
                thread::sleep(policy.delay);
            }
            Err(e) => return Err(e),
        }
    }
}
