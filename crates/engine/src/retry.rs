//! A typed retry policy for the write path's transient failures
//! (`Error::is_retryable()`: `FileWrite`/`FileSync`). Non-retryable
//! errors (validation, corruption, conflicts, resource caps) are
//! surfaced immediately regardless of this policy.

use docdb_core::Error;
use std::thread;
use std::time::Duration;

/// Bounded exponential backoff for transient I/O failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the backoff after each retry.
    pub backoff_multiplier: f64,
    /// Ceiling on the backoff delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 10,
            backoff_multiplier: 2.0,
            max_backoff_ms: 200,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries: the first failure is final.
    pub fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    fn backoff_for_attempt(&self, attempt: usize) -> Duration {
        let scaled = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((scaled as u64).min(self.max_backoff_ms))
    }
}

/// Runs `op` under the given retry policy. Retries only on
/// `Error::is_retryable()`; any other error (or the last attempt's
/// failure) is returned immediately.
pub fn with_retry<T, F>(config: &RetryConfig, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Result<T, Error>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_retryable() || attempt >= config.max_attempts {
                    return Err(err);
                }
                thread::sleep(config.backoff_for_attempt(attempt - 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;

    fn transient() -> Error {
        Error::FileWrite {
            path: "wal-000000.seg".into(),
            source: io::Error::new(io::ErrorKind::Other, "disk busy"),
        }
    }

    #[test]
    fn succeeds_immediately_without_retry_on_success() {
        let config = RetryConfig::default();
        let calls = Cell::new(0);
        let result = with_retry(&config, || {
            calls.set(calls.get() + 1);
            Ok::<_, Error>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_transient_failures_up_to_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
        };
        let calls = Cell::new(0);
        let result: Result<(), Error> = with_retry(&config, || {
            calls.set(calls.get() + 1);
            Err(transient())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_retryable_errors_fail_on_first_attempt() {
        let config = RetryConfig::default();
        let calls = Cell::new(0);
        let result: Result<(), Error> = with_retry(&config, || {
            calls.set(calls.get() + 1);
            Err(Error::PayloadTooLarge { size: 100, limit: 10 })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn no_retry_policy_makes_exactly_one_attempt() {
        let config = RetryConfig::no_retry();
        let calls = Cell::new(0);
        let result: Result<(), Error> = with_retry(&config, || {
            calls.set(calls.get() + 1);
            Err(transient())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn eventual_success_after_transient_failures_returns_ok() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
        };
        let calls = Cell::new(0);
        let result = with_retry(&config, || {
            let n = calls.get() + 1;
            calls.set(n);
            if n < 3 {
                Err(transient())
            } else {
                Ok(n)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }
}
