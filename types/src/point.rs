//! The linear decay line `(bias, slope)` at a reference time.
//!
//! `value(t) = max(0, bias - slope * (t - ts))`. Locks, the aggregated supply
//! and per-user history entries all use this representation.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub bias: i128,
    pub slope: i128,
    pub ts: Timestamp,
}

impl Point {
    pub fn new(bias: i128, slope: i128, ts: Timestamp) -> Self {
        Self { bias, slope, ts }
    }

    /// A zero line anchored at `ts`.
    pub fn zero(ts: Timestamp) -> Self {
        Self {
            bias: 0,
            slope: 0,
            ts,
        }
    }

    /// Line for `amount` locked until `end`, observed at `now`.
    ///
    /// `slope = amount / max_duration`, `bias = slope * (end - now)`. An
    /// expired or empty lock yields the zero line.
    pub fn for_lock(amount: u128, end: Timestamp, now: Timestamp, max_duration: u64) -> Option<Self> {
        if amount == 0 || end <= now || max_duration == 0 {
            return Some(Self::zero(now));
        }
        let slope = i128::try_from(amount / u128::from(max_duration)).ok()?;
        let remaining = i128::from(end.as_secs() - now.as_secs());
        let bias = slope.checked_mul(remaining)?;
        Some(Self {
            bias,
            slope,
            ts: now,
        })
    }

    /// Value of the line at `t`, floored at zero. Times before `ts` read as `ts`.
    pub fn value_at(&self, t: Timestamp) -> i128 {
        let dt = i128::from(self.ts.elapsed_since(t));
        self.bias.saturating_sub(self.slope.saturating_mul(dt)).max(0)
    }

    pub fn is_zero(&self) -> bool {
        self.bias == 0 && self.slope == 0
    }
}
