//! Failure tracking for repeated operations.
//!
//! Pipelines read frames continuously; a camera that keeps failing should
//! not flood the log.

use tracing::{debug, warn};

/// State tracker for repeated operations that may fail intermittently.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    ///
    /// Returns the number of failures that preceded this success.
    pub fn record_success(&mut self) -> u32 {
        let previous = self.consecutive_failures;
        if previous > 0 && self.suppressed {
            debug!("Operation recovered after {} consecutive failures", previous);
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
        previous
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged (not suppressed).
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
