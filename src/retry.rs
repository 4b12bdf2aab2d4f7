use crate::error::Result;
use std::time::Duration;
use tracing::warn;

/// Maximum number of attempts at a scan cycle before giving up until the next run
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Pause between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded attempts with a fixed pause, retrying only transient errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `operation`, passing the 1-based attempt number. Blocks the
    /// calling thread during the pause.
    pub fn run<T, F>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Will retry {} more times in {:?}",
                        what,
                        attempt,
                        max_attempts,
                        e,
                        max_attempts - attempt,
                        self.backoff
                    );
                    std::thread::sleep(self.backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
