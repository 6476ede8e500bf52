//! Timestamp type and week alignment used throughout the protocol.
//!
//! Timestamps are Unix epoch seconds (UTC). Every weekly bucket, slope change
//! and weight checkpoint is keyed by `timestamp / WEEK * WEEK`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DAY: u64 = 86_400;
pub const WEEK: u64 = 7 * DAY;
pub const YEAR: u64 = 365 * DAY;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    pub fn plus(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn minus(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Start of the week containing this timestamp.
    pub fn week_floor(&self) -> Self {
        Self(self.0 / WEEK * WEEK)
    }

    /// Smallest week boundary at or after this timestamp.
    pub fn week_ceil(&self) -> Self {
        Self(self.0.saturating_add(WEEK - 1) / WEEK * WEEK)
    }

    /// First week boundary strictly after this timestamp.
    pub fn next_week(&self) -> Self {
        Self(self.0.saturating_add(WEEK) / WEEK * WEEK)
    }

    pub fn is_week_aligned(&self) -> bool {
        self.0 % WEEK == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the canonical "current time" for every operation.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Timestamp::new(secs)
    }
}
