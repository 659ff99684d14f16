//! Overflow policies for the dispatch queue
//!
//! When the bounded queue is full, the policy decides what happens to the
//! event being emitted. None of them blocks a producer without a deadline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default wait for queue space before an event is dropped
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(50);

/// Policy for handling a full dispatch queue
///
/// # Example
///
/// ```
/// use tiered_log_pipeline::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: wait briefly, then drop and count
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::BlockWithTimeout(Duration::from_millis(50)));
///
/// // Evict the oldest queued event instead
/// let policy = OverflowPolicy::DropOldest;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the event being emitted; the drop is counted
    DropNewest,

    /// Evict the oldest queued event to make room for the new one
    ///
    /// Delivered events still keep their emission order.
    DropOldest,

    /// Wait up to the timeout for space, then drop the event
    #[serde(with = "timeout_ms")]
    BlockWithTimeout(Duration),

    /// Drop the event and alert via callback and stderr
    AlertAndDrop,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::BlockWithTimeout(DEFAULT_BLOCK_TIMEOUT)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// `{"policy": "block_with_timeout", "timeout_ms": 50}`
mod timeout_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Timeout {
        timeout_ms: u64,
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let timeout_ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        Timeout { timeout_ms }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Timeout::deserialize(deserializer).map(|t| Duration::from_millis(t.timeout_ms))
    }
}

/// Callback type for overflow notifications
///
/// Called when events are dropped because the queue is full.
/// The parameter is the total count of dropped events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
