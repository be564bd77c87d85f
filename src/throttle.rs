//! Throttling for the per-event capture path.
//!
//! A warning inside a hot loop must not produce unbounded output. After the
//! configured number of events the reporter shows one notice and then goes
//! silent for the rest of the process.

/// Default number of events reported individually.
pub const DEFAULT_THRESHOLD: u64 = 10;

/// Mask value that enables every severity.
pub const REPORT_ALL: i64 = -1;

/// What to do with the event that brought the counter to a given value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// Render the event normally.
    Report,
    /// Render the one-time "threshold reached" notice instead.
    ThresholdReached,
    /// Absorb the event without rendering anything.
    Suppressed,
}

/// Throttling policy: a threshold and the reporting mask that gates the notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventThrottle {
    threshold: u64,
    reporting_mask: i64,
}

impl Default for EventThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, REPORT_ALL)
    }
}

impl EventThrottle {
    /// Create a policy with the given threshold and reporting mask.
    pub fn new(threshold: u64, reporting_mask: i64) -> Self {
        Self {
            threshold,
            reporting_mask,
        }
    }

    /// The configured threshold.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Whether `severity` is enabled by the reporting mask.
    pub fn is_enabled(&self, severity: i64) -> bool {
        severity & self.reporting_mask == severity
    }

    /// Decide the fate of the event numbered `count` (1-based).
    pub fn verdict(&self, count: u64, severity: i64) -> ThrottleVerdict {
        if count <= self.threshold {
            ThrottleVerdict::Report
        } else if count == self.threshold.saturating_add(1) && self.is_enabled(severity) {
            ThrottleVerdict::ThresholdReached
        } else {
            ThrottleVerdict::Suppressed
        }
    }
}
