use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Opaque monotonic capture time in nanoseconds.
///
/// Readings come from the process-wide monotonic clock and are only
/// meaningful relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    /// Current monotonic clock reading.
    pub fn now() -> Self {
        let anchor = *CLOCK_ANCHOR.get_or_init(Instant::now);
        let nanos = anchor.elapsed().as_nanos();
        Self(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Absolute distance between two readings, in nanoseconds.
    pub fn abs_diff(self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }
}
