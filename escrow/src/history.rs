//! Global supply history.
//!
//! An append-only log of `(bias, slope, ts)` points (one per crossed week
//! boundary plus one per mutation) and a sparse map of slope decrements
//! scheduled at each lock's unlock week. Evaluating the supply at `t` replays
//! from the latest point not after `t`, applying every scheduled decrement in
//! chronological order.

use crate::error::EscrowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};
use vegov_types::{Point, Timestamp, WEEK};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplyHistory {
    points: Vec<Point>,
    /// Slope removed from the aggregate when the keyed week is crossed.
    slope_changes: BTreeMap<Timestamp, i128>,
    max_weeks: u32,
}

/// Move `p` forward to `t`, then subtract `d_slope` from its slope.
fn step(p: Point, t: Timestamp, d_slope: i128) -> Point {
    let dt = i128::from(p.ts.elapsed_since(t));
    Point {
        bias: p.bias.saturating_sub(p.slope.saturating_mul(dt)).max(0),
        slope: p.slope.saturating_sub(d_slope).max(0),
        ts: t,
    }
}

impl SupplyHistory {
    pub fn new(genesis: Timestamp, max_weeks: u32) -> Self {
        Self {
            points: vec![Point::zero(genesis)],
            slope_changes: BTreeMap::new(),
            max_weeks,
        }
    }

    /// Index of the latest point.
    pub fn epoch(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn point(&self, epoch: usize) -> Option<&Point> {
        self.points.get(epoch)
    }

    pub fn last(&self) -> Point {
        self.points.last().copied().unwrap_or_default()
    }

    pub fn slope_change(&self, week: Timestamp) -> i128 {
        self.slope_changes.get(&week).copied().unwrap_or(0)
    }

    /// Nothing can change the aggregate after `p`: no slope left and no
    /// pending decrement.
    fn is_settled(&self, p: &Point) -> bool {
        p.slope == 0
            && self
                .slope_changes
                .range(p.ts.plus(1)..)
                .all(|(_, d)| *d == 0)
    }

    /// Store `p`, overwriting the latest point when it shares the timestamp.
    fn record(&mut self, p: Point) {
        match self.points.last_mut() {
            Some(last) if last.ts == p.ts => *last = p,
            _ => self.points.push(p),
        }
    }

    /// Catch the latest point up to `now`, writing a point per crossed week.
    ///
    /// At most `max_weeks` boundaries are replayed per call. Returns `true`
    /// once the latest point sits at `now`; `false` means a follow-up call is
    /// needed. A second call at the same `now` changes nothing.
    pub fn advance(&mut self, now: Timestamp) -> bool {
        let mut last = self.last();
        if last.ts >= now {
            return true;
        }
        let mut t_i = last.ts.week_floor();
        for _ in 0..self.max_weeks {
            if self.is_settled(&last) {
                last.ts = now;
                self.record(last);
                return true;
            }
            t_i = t_i.plus(WEEK);
            let mut d_slope = 0;
            if t_i > now {
                t_i = now;
            } else {
                d_slope = self.slope_change(t_i);
            }
            last = step(last, t_i, d_slope);
            self.record(last);
            if t_i == now {
                return true;
            }
        }
        false
    }

    /// Swap a user's line `old` for `new` in the aggregate at `now`.
    ///
    /// `old_end` / `new_end` are the unlock weeks the lines were (or will be)
    /// scheduled to leave the aggregate.
    pub fn apply_user_change(
        &mut self,
        old: &Point,
        old_end: Timestamp,
        new: &Point,
        new_end: Timestamp,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let mut last = self.last();
        if last.ts != now {
            return Err(EscrowError::CheckpointBehind {
                caught_up_to: last.ts,
            });
        }
        last.slope = last
            .slope
            .checked_add(new.slope)
            .and_then(|s| s.checked_sub(old.slope))
            .ok_or(EscrowError::Overflow)?
            .max(0);
        last.bias = last
            .bias
            .checked_add(new.bias)
            .and_then(|b| b.checked_sub(old.bias))
            .ok_or(EscrowError::Overflow)?
            .max(0);
        self.record(last);

        if old_end > now {
            let mut old_dslope = self.slope_change(old_end) - old.slope;
            if new_end == old_end {
                old_dslope += new.slope;
            }
            self.slope_changes.insert(old_end, old_dslope);
        }
        if new_end > now && new_end > old_end {
            let new_dslope = self.slope_change(new_end) + new.slope;
            self.slope_changes.insert(new_end, new_dslope);
        }
        Ok(())
    }

    /// Aggregate voting power at `t`, floored at zero. Zero before genesis.
    ///
    /// Not bounded by `max_weeks`: steps through every scheduled decrement
    /// between the latest point and `t`.
    pub fn supply_at(&self, t: Timestamp) -> u128 {
        let idx = self.points.partition_point(|p| p.ts <= t);
        if idx == 0 {
            return 0;
        }
        let mut last = self.points[idx - 1];
        if last.ts < t {
            for (&week, &d_slope) in self.slope_changes.range((Excluded(last.ts), Included(t))) {
                last = step(last, week, d_slope);
            }
            last = step(last, t, 0);
        }
        u128::try_from(last.bias.max(0)).unwrap_or(0)
    }
}
