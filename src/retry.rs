//! Bounded retry policies.
//!
//! A [`RetryPolicy`] is a retry count, a base delay and a growth shape. It
//! only produces the delay sequence; callers decide what is retryable.
//! Page construction walks the sequence on a blocking thread, while the
//! conversion pipeline hands it to [`tokio_retry::RetryIf`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval};

/// Shape of the delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `base * n` before the n-th retry.
    Linear,
    /// `base * 2^n` before the n-th retry.
    Exponential,
}

/// Retry count plus backoff.
///
/// # Example
///
/// ```rust
/// use html2pdf_pool::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::linear(3, Duration::from_millis(100));
/// let delays: Vec<_> = policy.delays().collect();
/// assert_eq!(
///     delays,
///     vec![
///         Duration::from_millis(100),
///         Duration::from_millis(200),
///         Duration::from_millis(300),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Base delay.
    pub base_delay: Duration,
    /// Growth shape.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Linearly growing delays.
    pub const fn linear(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    /// Doubling delays.
    pub const fn exponential(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// No retries at all.
    pub const fn none() -> Self {
        Self::linear(0, Duration::ZERO)
    }

    /// Total attempts, including the first one.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// The delay before each retry, in order. Yields exactly
    /// `max_retries` items.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let retries = self.max_retries;
        match self.backoff {
            Backoff::Linear => Box::new(
                FixedInterval::new(self.base_delay)
                    .take(retries)
                    .zip(1u32..)
                    .map(|(delay, n)| delay * n),
            ),
            Backoff::Exponential => {
                let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
                Box::new(
                    ExponentialBackoff::from_millis(2)
                        .factor(base_ms)
                        .take(retries),
                )
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
