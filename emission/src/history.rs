//! Piecewise-constant rate history.

use crate::error::EmissionError;
use serde::{Deserialize, Serialize};
use vegov_types::Timestamp;

/// One rate in force over `[start, end)`. The last segment is open-ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSegment {
    /// Tokens per second (18 decimals).
    pub rate: u128,
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

/// Every rate the schedule has used, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistory {
    pub segments: Vec<RateSegment>,
}

impl RateHistory {
    pub fn new(initial_rate: u128, genesis: Timestamp) -> Self {
        Self {
            segments: vec![RateSegment {
                rate: initial_rate,
                start: genesis,
                end: None,
            }],
        }
    }

    /// Close the open segment at `change_at` and start a new one.
    pub fn apply_rate_change(&mut self, new_rate: u128, change_at: Timestamp) -> Result<(), EmissionError> {
        if let Some(current) = self.segments.last_mut() {
            if change_at < current.start {
                return Err(EmissionError::InvalidTimestamp);
            }
            current.end = Some(change_at);
        }
        self.segments.push(RateSegment {
            rate: new_rate,
            start: change_at,
            end: None,
        });
        Ok(())
    }

    pub fn current_rate(&self) -> u128 {
        self.segments.last().map(|s| s.rate).unwrap_or(0)
    }

    /// Tokens issued over `[from, to)`. `None` on overflow.
    pub fn issued_between_checked(&self, from: Timestamp, to: Timestamp) -> Option<u128> {
        let mut total: u128 = 0;
        for seg in &self.segments {
            let start = seg.start.max(from);
            let end = seg.end.unwrap_or(to).min(to);
            if start >= end {
                continue;
            }
            let duration = u128::from(end.as_secs() - start.as_secs());
            total = total.checked_add(seg.rate.checked_mul(duration)?)?;
        }
        Some(total)
    }

    /// Tokens issued over `[from, to)`, saturating on overflow.
    pub fn issued_between(&self, from: Timestamp, to: Timestamp) -> u128 {
        self.issued_between_checked(from, to).unwrap_or(u128::MAX)
    }
}

impl Default for RateHistory {
    fn default() -> Self {
        Self::new(0, Timestamp::EPOCH)
    }
}
