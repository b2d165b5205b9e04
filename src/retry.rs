//! Retry with fixed delay and network outage handling
//!
//! Transient failures are retried up to a fixed number of attempts. When a
//! failure coincides with the store being unreachable, the loop waits for
//! connectivity to return and retries without consuming an attempt.

use crate::error::{BackupError, Result};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub attempts: u32,
    pub delay: Duration,
    pub connectivity_poll: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
            connectivity_poll: Duration::from_secs(30),
        }
    }
}

/// Run `f` until it succeeds, fails permanently, or runs out of attempts.
///
/// `is_reachable` is consulted after every transient failure.
pub fn retry<T>(
    policy: &RetryPolicy,
    op: &str,
    is_reachable: impl Fn() -> bool,
    mut f: impl FnMut(u32) -> Result<T>,
) -> Result<T> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if !is_reachable() {
                    warn!(op, error = %e, "Store unreachable, waiting for connectivity");
                    while !is_reachable() {
                        std::thread::sleep(policy.connectivity_poll);
                    }
                    info!(op, "Connectivity restored, retrying");
                    continue;
                }
                if attempt >= attempts {
                    return Err(BackupError::RetriesExhausted {
                        op: op.to_string(),
                        attempts,
                        last: e.to_string(),
                    });
                }
                warn!(
                    "{op}: transient error (attempt {attempt}/{attempts}), retrying: {e}"
                );
                attempt += 1;
                std::thread::sleep(policy.delay);
            }
        }
    }
}
