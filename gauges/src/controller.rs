//! The gauge controller.

use crate::error::GaugeError;
use crate::line::WeightLine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vegov_escrow::VotingEscrow;
use vegov_types::{
    mul_div, mul_div_u256, u256_to_u128, Address, AdminRoles, ProtocolParams, Role, Timestamp,
    BPS_DENOMINATOR, U256, UNIT,
};

pub type GaugeTypeId = u32;

/// One user's allocation to one gauge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedSlope {
    pub slope: u128,
    /// Basis points of the user's power.
    pub power: u32,
    pub end: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GaugeType {
    name: String,
    /// Weight multiplier, keyed by the week it takes effect.
    weights: BTreeMap<Timestamp, u128>,
    /// Sum of the weights of every gauge of this type.
    sum: WeightLine,
}

impl GaugeType {
    fn weight_at(&self, t: Timestamp) -> u128 {
        self.weights
            .range(..=t)
            .next_back()
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Gauge {
    type_id: GaugeTypeId,
    weight: WeightLine,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GaugeController {
    params: ProtocolParams,
    roles: AdminRoles,
    types: Vec<GaugeType>,
    gauges: BTreeMap<Address, Gauge>,
    /// Registration order.
    gauge_list: Vec<Address>,
    vote_user_slopes: BTreeMap<Address, BTreeMap<Address, VotedSlope>>,
    vote_user_power: BTreeMap<Address, u32>,
    last_user_vote: BTreeMap<Address, BTreeMap<Address, Timestamp>>,
}

impl GaugeController {
    pub fn new(admin: &Address, params: ProtocolParams) -> Self {
        Self {
            params,
            roles: AdminRoles::new(admin),
            types: Vec::new(),
            gauges: BTreeMap::new(),
            gauge_list: Vec::new(),
            vote_user_slopes: BTreeMap::new(),
            vote_user_power: BTreeMap::new(),
            last_user_vote: BTreeMap::new(),
        }
    }

    pub fn roles(&self) -> &AdminRoles {
        &self.roles
    }

    pub fn n_gauge_types(&self) -> u32 {
        self.types.len() as u32
    }

    pub fn n_gauges(&self) -> usize {
        self.gauge_list.len()
    }

    pub fn gauges(&self) -> &[Address] {
        &self.gauge_list
    }

    pub fn is_gauge(&self, gauge: &Address) -> bool {
        self.gauges.contains_key(gauge)
    }

    pub fn type_name(&self, type_id: GaugeTypeId) -> Option<&str> {
        self.types.get(type_id as usize).map(|t| t.name.as_str())
    }

    pub fn gauge_type(&self, gauge: &Address) -> Result<GaugeTypeId, GaugeError> {
        Ok(self.gauge(gauge)?.type_id)
    }

    /// Week of the gauge's latest written weight point.
    pub fn time_weight(&self, gauge: &Address) -> Result<Timestamp, GaugeError> {
        Ok(self.gauge(gauge)?.weight.last_week())
    }

    pub fn gauge_weight(&self, gauge: &Address, t: Timestamp) -> u128 {
        self.gauges
            .get(gauge)
            .map_or(0, |g| g.weight.bias_at(t))
    }

    pub fn type_weight(&self, type_id: GaugeTypeId, t: Timestamp) -> u128 {
        self.types
            .get(type_id as usize)
            .map_or(0, |ty| ty.weight_at(t.week_floor()))
    }

    pub fn weights_sum_per_type(&self, type_id: GaugeTypeId, t: Timestamp) -> u128 {
        self.types
            .get(type_id as usize)
            .map_or(0, |ty| ty.sum.bias_at(t))
    }

    /// Sum over types of `type sum x type weight` at the week containing `t`.
    pub fn total_weight(&self, t: Timestamp) -> U256 {
        let week = t.week_floor();
        self.types.iter().fold(U256::zero(), |acc, ty| {
            let sum = ty.sum.bias_at(week);
            acc.saturating_add(U256::from(sum).saturating_mul(U256::from(ty.weight_at(week))))
        })
    }

    /// Basis points of voting power `user` has allocated.
    pub fn vote_user_power(&self, user: &Address) -> u32 {
        self.vote_user_power.get(user).copied().unwrap_or(0)
    }

    pub fn vote_user_slope(&self, user: &Address, gauge: &Address) -> VotedSlope {
        self.vote_user_slopes
            .get(user)
            .and_then(|m| m.get(gauge))
            .copied()
            .unwrap_or_default()
    }

    pub fn last_user_vote(&self, user: &Address, gauge: &Address) -> Option<Timestamp> {
        self.last_user_vote.get(user).and_then(|m| m.get(gauge)).copied()
    }

    /// Share of total emission weight held by `gauge` at the week containing
    /// `t`, as a fraction of [`UNIT`]. Zero for unknown gauges and when
    /// nothing is weighted.
    pub fn gauge_relative_weight(&self, gauge: &Address, t: Timestamp) -> u128 {
        let Some(g) = self.gauges.get(gauge) else {
            return 0;
        };
        let week = t.week_floor();
        let total = self.total_weight(week);
        if total.is_zero() {
            return 0;
        }
        let type_weight = self.type_weight(g.type_id, week);
        let gauge_weight = g.weight.bias_at(week);
        let numerator = U256::from(UNIT).saturating_mul(U256::from(type_weight));
        mul_div_u256(numerator, U256::from(gauge_weight), total)
            .and_then(u256_to_u128)
            .unwrap_or(0)
    }

    // ── Checkpoints ──────────────────────────────────────────────────────

    /// Write every type's sum line up to `now`.
    pub fn checkpoint(&mut self, now: Timestamp) -> bool {
        let max = self.params.gauge_checkpoint_weeks;
        let caught_up = self
            .types
            .iter_mut()
            .fold(true, |ok, ty| ty.sum.advance(now, max) && ok);
        debug!(caught_up, "gauge controller checkpoint");
        caught_up
    }

    /// Write the gauge's line and its type's sum line up to `now`.
    pub fn checkpoint_gauge(&mut self, gauge: &Address, now: Timestamp) -> Result<bool, GaugeError> {
        let max = self.params.gauge_checkpoint_weeks;
        let g = self
            .gauges
            .get_mut(gauge)
            .ok_or_else(|| GaugeError::GaugeNotFound(gauge.clone()))?;
        let gauge_ok = g.weight.advance(now, max);
        let ty = self
            .types
            .get_mut(g.type_id as usize)
            .ok_or(GaugeError::TypeNotFound(g.type_id))?;
        let sum_ok = ty.sum.advance(now, max);
        Ok(gauge_ok && sum_ok)
    }

    pub fn gauge_relative_weight_write(&mut self, gauge: &Address, now: Timestamp) -> Result<u128, GaugeError> {
        self.checkpoint_gauge(gauge, now)?;
        self.checkpoint(now);
        Ok(self.gauge_relative_weight(gauge, now))
    }

    // ── Administration ───────────────────────────────────────────────────

    /// Register a gauge type. Its weight applies from the next week.
    pub fn add_type(
        &mut self,
        caller: &Address,
        name: &str,
        weight: u128,
        now: Timestamp,
    ) -> Result<GaugeTypeId, GaugeError> {
        self.roles.ensure(Role::Ownership, caller)?;
        let type_id = self.n_gauge_types();
        let next_week = now.next_week();
        let mut weights = BTreeMap::new();
        weights.insert(next_week, weight);
        self.types.push(GaugeType {
            name: name.to_string(),
            weights,
            sum: WeightLine::new(next_week, 0),
        });
        info!(type_id, name, weight, effective = %next_week, "gauge type added");
        Ok(type_id)
    }

    /// Register `gauge` under `type_id` with a constant starting weight,
    /// effective from the next week.
    pub fn add_gauge(
        &mut self,
        caller: &Address,
        gauge: &Address,
        type_id: GaugeTypeId,
        weight: u128,
        now: Timestamp,
    ) -> Result<(), GaugeError> {
        self.roles.ensure(Role::Ownership, caller)?;
        if self.gauges.contains_key(gauge) {
            return Err(GaugeError::GaugeExists(gauge.clone()));
        }
        let next_week = now.next_week();
        let ty = self
            .types
            .get_mut(type_id as usize)
            .ok_or(GaugeError::TypeNotFound(type_id))?;
        if !ty.sum.advance(now, self.params.gauge_checkpoint_weeks) {
            return Err(GaugeError::CheckpointBehind {
                caught_up_to: ty.sum.last_week(),
            });
        }
        if weight > 0 {
            let sum = ty.sum.point_mut(next_week);
            sum.bias = sum.bias.checked_add(weight).ok_or(GaugeError::Overflow)?;
        }
        self.gauges.insert(
            gauge.clone(),
            Gauge {
                type_id,
                weight: WeightLine::new(next_week, weight),
            },
        );
        self.gauge_list.push(gauge.clone());
        info!(gauge = %gauge, type_id, weight, effective = %next_week, "gauge added");
        Ok(())
    }

    pub fn change_type_weight(
        &mut self,
        caller: &Address,
        type_id: GaugeTypeId,
        weight: u128,
        now: Timestamp,
    ) -> Result<(), GaugeError> {
        self.roles.ensure_any(&[Role::Ownership, Role::Parameter], caller)?;
        let next_week = now.next_week();
        let ty = self
            .types
            .get_mut(type_id as usize)
            .ok_or(GaugeError::TypeNotFound(type_id))?;
        ty.weights.insert(next_week, weight);
        info!(type_id, weight, effective = %next_week, "type weight changed");
        Ok(())
    }

    /// Set the gauge's bias from the next week on. Its vote slope is kept.
    pub fn change_gauge_weight(
        &mut self,
        caller: &Address,
        gauge: &Address,
        weight: u128,
        now: Timestamp,
    ) -> Result<(), GaugeError> {
        self.roles.ensure_any(&[Role::Ownership, Role::Parameter], caller)?;
        self.ensure_caught_up(gauge, now)?;
        let next_week = now.next_week();
        let (g, ty) = self.gauge_and_type_mut(gauge)?;

        let point = g.weight.point_mut(next_week);
        let old = point.bias;
        point.bias = weight;
        let sum = ty.sum.point_mut(next_week);
        sum.bias = sum
            .bias
            .checked_add(weight)
            .ok_or(GaugeError::Overflow)?
            .saturating_sub(old);
        info!(gauge = %gauge, old, weight, effective = %next_week, "gauge weight changed");
        Ok(())
    }

    pub fn commit_role(&mut self, role: Role, caller: &Address, new_holder: &Address) -> Result<(), GaugeError> {
        self.roles.commit(role, caller, new_holder)?;
        Ok(())
    }

    pub fn apply_role(&mut self, role: Role, caller: &Address) -> Result<(), GaugeError> {
        self.roles.apply(role, caller)?;
        Ok(())
    }

    // ── Voting ───────────────────────────────────────────────────────────

    /// Allocate `weight_bps` of `user`'s voting power to `gauge`, replacing
    /// any previous allocation to it.
    pub fn vote_for_gauge_weights(
        &mut self,
        user: &Address,
        gauge: &Address,
        weight_bps: u32,
        escrow: &VotingEscrow,
        now: Timestamp,
    ) -> Result<(), GaugeError> {
        if u128::from(weight_bps) > BPS_DENOMINATOR {
            return Err(GaugeError::InvalidVoteWeight(weight_bps));
        }
        if !self.gauges.contains_key(gauge) {
            return Err(GaugeError::GaugeNotFound(gauge.clone()));
        }
        let next_week = now.next_week();
        let lock_end = escrow.locked_end(user);
        if lock_end <= next_week {
            return Err(GaugeError::LockExpiresTooSoon { lock_end, next_week });
        }
        if let Some(last) = self.last_user_vote(user, gauge) {
            let next_allowed = last.plus(self.params.weight_vote_delay);
            if now < next_allowed {
                return Err(GaugeError::VoteTooSoon { next_allowed });
            }
        }

        let user_slope = u128::try_from(escrow.last_user_slope(user)).unwrap_or(0);
        let old = self.vote_user_slope(user, gauge);
        let new = VotedSlope {
            slope: mul_div(user_slope, u128::from(weight_bps), BPS_DENOMINATOR)
                .ok_or(GaugeError::Overflow)?,
            power: weight_bps,
            end: lock_end,
        };
        let old_bias = old.slope.saturating_mul(remaining(old.end, next_week));
        let new_bias = new
            .slope
            .checked_mul(remaining(new.end, next_week))
            .ok_or(GaugeError::Overflow)?;

        let used = (self.vote_user_power(user) + new.power)
            .checked_sub(old.power)
            .ok_or(GaugeError::Overflow)?;
        if u128::from(used) > BPS_DENOMINATOR {
            return Err(GaugeError::VotePowerExceeded { used });
        }

        self.ensure_caught_up(gauge, now)?;
        let (g, ty) = self.gauge_and_type_mut(gauge)?;
        for line in [&mut g.weight, &mut ty.sum] {
            let point = line.point_mut(next_week);
            point.bias = point.bias.saturating_add(new_bias).max(old_bias) - old_bias;
            if old.end > next_week {
                point.slope = point.slope.saturating_add(new.slope).max(old.slope) - old.slope;
                line.cancel_change(old.end, old.slope);
            } else {
                point.slope = point.slope.saturating_add(new.slope);
            }
            line.schedule_change(new.end, new.slope);
        }

        self.vote_user_power.insert(user.clone(), used);
        self.vote_user_slopes
            .entry(user.clone())
            .or_default()
            .insert(gauge.clone(), new);
        self.last_user_vote
            .entry(user.clone())
            .or_default()
            .insert(gauge.clone(), now);
        info!(
            user = %user,
            gauge = %gauge,
            weight_bps,
            power_used = used,
            slope = new.slope,
            end = %new.end,
            "gauge vote"
        );
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn gauge(&self, gauge: &Address) -> Result<&Gauge, GaugeError> {
        self.gauges
            .get(gauge)
            .ok_or_else(|| GaugeError::GaugeNotFound(gauge.clone()))
    }

    fn gauge_and_type_mut(&mut self, gauge: &Address) -> Result<(&mut Gauge, &mut GaugeType), GaugeError> {
        let g = self
            .gauges
            .get_mut(gauge)
            .ok_or_else(|| GaugeError::GaugeNotFound(gauge.clone()))?;
        let ty = self
            .types
            .get_mut(g.type_id as usize)
            .ok_or(GaugeError::TypeNotFound(g.type_id))?;
        Ok((g, ty))
    }

    fn ensure_caught_up(&mut self, gauge: &Address, now: Timestamp) -> Result<(), GaugeError> {
        if !self.checkpoint_gauge(gauge, now)? {
            return Err(GaugeError::CheckpointBehind {
                caught_up_to: self.time_weight(gauge)?,
            });
        }
        Ok(())
    }
}

/// Seconds from `from` until `end`, zero once passed.
fn remaining(end: Timestamp, from: Timestamp) -> u128 {
    u128::from(from.elapsed_since(end))
}
