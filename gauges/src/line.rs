//! Week-keyed decaying weight lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};
use vegov_types::{Timestamp, WEEK};

/// A weight line evaluated at a week boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightPoint {
    pub bias: u128,
    pub slope: u128,
}

impl WeightPoint {
    /// The point `weeks` weeks later, with `d_slope` removed at the final
    /// week. A line that would reach zero on the way ends at zero.
    fn after_weeks(self, weeks: u64, d_slope: u128) -> Self {
        let d_bias = self.slope.saturating_mul(u128::from(weeks.saturating_mul(WEEK)));
        if self.bias > d_bias {
            Self {
                bias: self.bias - d_bias,
                slope: self.slope.saturating_sub(d_slope),
            }
        } else {
            Self::default()
        }
    }
}

fn weeks_between(from: Timestamp, to: Timestamp) -> u64 {
    from.elapsed_since(to) / WEEK
}

/// Points written for every week from creation to `last_week`, plus slope
/// decrements scheduled at future weeks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightLine {
    points: BTreeMap<Timestamp, WeightPoint>,
    changes: BTreeMap<Timestamp, u128>,
    last_week: Timestamp,
}

impl WeightLine {
    /// A line starting at `week` with a constant `bias`.
    pub fn new(week: Timestamp, bias: u128) -> Self {
        let week = week.week_floor();
        let mut points = BTreeMap::new();
        points.insert(week, WeightPoint { bias, slope: 0 });
        Self {
            points,
            changes: BTreeMap::new(),
            last_week: week,
        }
    }

    /// Latest week with a written point.
    pub fn last_week(&self) -> Timestamp {
        self.last_week
    }

    pub fn change_at(&self, week: Timestamp) -> u128 {
        self.changes.get(&week).copied().unwrap_or(0)
    }

    /// The line at the week containing `t`. Weeks past `last_week` are
    /// replayed in memory, jumping between scheduled slope changes.
    pub fn point_at(&self, t: Timestamp) -> WeightPoint {
        let week = t.week_floor();
        if week <= self.last_week {
            return self
                .points
                .range(..=week)
                .next_back()
                .map(|(_, p)| *p)
                .unwrap_or_default();
        }
        let mut pt = self.points.get(&self.last_week).copied().unwrap_or_default();
        let mut w = self.last_week;
        for (&at, &d_slope) in self.changes.range((Excluded(w), Included(week))) {
            if pt.slope == 0 {
                return pt;
            }
            pt = pt.after_weeks(weeks_between(w, at), d_slope);
            w = at;
        }
        if pt.slope > 0 && w < week {
            pt = pt.after_weeks(weeks_between(w, week), 0);
        }
        pt
    }

    pub fn bias_at(&self, t: Timestamp) -> u128 {
        self.point_at(t).bias
    }

    /// Write points up to the first week boundary after `now`. Returns
    /// `false` if `max_weeks` ran out first.
    pub fn advance(&mut self, now: Timestamp, max_weeks: u32) -> bool {
        let target = now.next_week();
        let mut pt = self.points.get(&self.last_week).copied().unwrap_or_default();
        for _ in 0..max_weeks {
            if self.last_week >= target {
                break;
            }
            self.last_week = self.last_week.plus(WEEK);
            pt = pt.after_weeks(1, self.change_at(self.last_week));
            self.points.insert(self.last_week, pt);
        }
        self.last_week >= target
    }

    pub fn point_mut(&mut self, week: Timestamp) -> &mut WeightPoint {
        self.points.entry(week).or_default()
    }

    pub fn schedule_change(&mut self, week: Timestamp, slope: u128) {
        let entry = self.changes.entry(week).or_default();
        *entry = entry.saturating_add(slope);
    }

    pub fn cancel_change(&mut self, week: Timestamp, slope: u128) {
        let entry = self.changes.entry(week).or_default();
        *entry = entry.saturating_sub(slope);
    }
}
