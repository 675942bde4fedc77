//! Append-only log entries shared by tasks and concerns.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One timestamped line in a progress or analysis log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
    pub text: String,
}

impl LogEntry {
    pub fn new(timestamp_ms: i64, text: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            text: text.into(),
        }
    }

    /// Creates an entry stamped with the current wall-clock time.
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(now_epoch_ms(), text)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Falls back to `0` if the system clock reports a time before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
