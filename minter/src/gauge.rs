//! Liquidity gauges: staking plus the per-gauge reward integral.

use crate::error::MinterError;
use crate::minter::Minter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vegov_emission::EmissionSchedule;
use vegov_gauges::GaugeController;
use vegov_types::{
    mul_div_u256, u256_to_u128, Address, FungibleToken, Timestamp, TokenError, U256, UNIT, WEEK,
};

/// What the minter needs from a staking destination.
pub trait RewardGauge {
    fn address(&self) -> &Address;

    /// Bring the gauge's integral and `user`'s share up to `now`. Returns
    /// `false` if the integral could not be fully caught up in one call.
    fn user_checkpoint(
        &mut self,
        user: &Address,
        schedule: &mut EmissionSchedule,
        controller: &mut GaugeController,
        now: Timestamp,
    ) -> Result<bool, MinterError>;

    /// Everything `user` has earned from this gauge so far, minted or not.
    fn integrate_fraction(&self, user: &Address) -> u128;
}

/// A gauge where users stake an LP token and earn emission pro rata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiquidityGauge {
    address: Address,
    max_weeks: u32,
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
    period_timestamp: Timestamp,
    /// Running sum of `emitted x relative weight / total staked`.
    integrate_inv_supply: U256,
    integrate_inv_supply_of: BTreeMap<Address, U256>,
    integrate_checkpoint_of: BTreeMap<Address, Timestamp>,
    integrate_fraction: BTreeMap<Address, u128>,
}

impl LiquidityGauge {
    pub fn new(address: Address, max_weeks: u32, now: Timestamp) -> Self {
        Self {
            address,
            max_weeks,
            balances: BTreeMap::new(),
            total_supply: 0,
            period_timestamp: now,
            integrate_inv_supply: U256::zero(),
            integrate_inv_supply_of: BTreeMap::new(),
            integrate_checkpoint_of: BTreeMap::new(),
            integrate_fraction: BTreeMap::new(),
        }
    }

    pub fn balance_of(&self, user: &Address) -> u128 {
        self.balances.get(user).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn period_timestamp(&self) -> Timestamp {
        self.period_timestamp
    }

    pub fn integrate_inv_supply(&self) -> U256 {
        self.integrate_inv_supply
    }

    pub fn integrate_checkpoint_of(&self, user: &Address) -> Option<Timestamp> {
        self.integrate_checkpoint_of.get(user).copied()
    }

    /// Stake `amount` LP tokens from `user`.
    pub fn deposit(
        &mut self,
        user: &Address,
        amount: u128,
        lp_token: &mut impl FungibleToken,
        schedule: &mut EmissionSchedule,
        controller: &mut GaugeController,
        now: Timestamp,
    ) -> Result<(), MinterError> {
        if amount == 0 {
            return Err(MinterError::ZeroAmount);
        }
        let available = lp_token.balance_of(user);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                needed: amount,
                available,
            }
            .into());
        }
        self.checkpoint_caught_up(user, schedule, controller, now)?;
        let balance = self
            .balance_of(user)
            .checked_add(amount)
            .ok_or(MinterError::Overflow)?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(MinterError::Overflow)?;
        self.balances.insert(user.clone(), balance);

        lp_token.transfer(user, &self.address, amount)?;
        info!(gauge = %self.address, user = %user, amount, total = self.total_supply, "gauge deposit");
        Ok(())
    }

    /// Unstake `amount` LP tokens back to `user`.
    pub fn withdraw(
        &mut self,
        user: &Address,
        amount: u128,
        lp_token: &mut impl FungibleToken,
        schedule: &mut EmissionSchedule,
        controller: &mut GaugeController,
        now: Timestamp,
    ) -> Result<(), MinterError> {
        if amount == 0 {
            return Err(MinterError::ZeroAmount);
        }
        let balance = self.balance_of(user);
        if balance < amount {
            return Err(MinterError::InsufficientStake {
                needed: amount,
                available: balance,
            });
        }
        self.checkpoint_caught_up(user, schedule, controller, now)?;
        self.balances.insert(user.clone(), balance - amount);
        self.total_supply = self.total_supply.saturating_sub(amount);

        lp_token.transfer(&self.address, user, amount)?;
        info!(gauge = %self.address, user = %user, amount, total = self.total_supply, "gauge withdraw");
        Ok(())
    }

    /// What `user` could mint from this gauge at `now`.
    pub fn claimable_tokens(
        &self,
        user: &Address,
        minter: &Minter,
        schedule: &EmissionSchedule,
        controller: &GaugeController,
        now: Timestamp,
    ) -> Result<u128, MinterError> {
        let schedule = schedule.projected(now)?;
        let (inv, _) = self.accrue(&schedule, controller, now)?;
        let earned = self
            .integrate_fraction(user)
            .checked_add(self.user_delta(user, inv)?)
            .ok_or(MinterError::Overflow)?;
        Ok(earned.saturating_sub(minter.minted(user, &self.address)))
    }

    fn checkpoint_caught_up(
        &mut self,
        user: &Address,
        schedule: &mut EmissionSchedule,
        controller: &mut GaugeController,
        now: Timestamp,
    ) -> Result<(), MinterError> {
        if !self.user_checkpoint(user, schedule, controller, now)? {
            return Err(MinterError::CheckpointBehind {
                caught_up_to: self.period_timestamp,
            });
        }
        Ok(())
    }

    /// The integral advanced from `period_timestamp` toward `now`, one week
    /// segment at a time, and the time it reached.
    fn accrue(
        &self,
        schedule: &EmissionSchedule,
        controller: &GaugeController,
        now: Timestamp,
    ) -> Result<(U256, Timestamp), MinterError> {
        let mut prev = self.period_timestamp;
        let mut inv = self.integrate_inv_supply;
        if now <= prev {
            return Ok((inv, prev));
        }
        if self.total_supply == 0 {
            return Ok((inv, now));
        }
        let supply = U256::from(self.total_supply);
        for _ in 0..self.max_weeks {
            let week_end = prev.week_floor().plus(WEEK).min(now);
            let weight = controller.gauge_relative_weight(&self.address, prev);
            let emitted = schedule.emitted_between(prev, week_end);
            if weight > 0 && emitted > 0 {
                let delta = mul_div_u256(U256::from(emitted), U256::from(weight), supply)
                    .ok_or(MinterError::Overflow)?;
                inv = inv.checked_add(delta).ok_or(MinterError::Overflow)?;
            }
            prev = week_end;
            if prev == now {
                break;
            }
        }
        Ok((inv, prev))
    }

    /// Reward `user` earned between their snapshot and `inv`.
    fn user_delta(&self, user: &Address, inv: U256) -> Result<u128, MinterError> {
        let inv_of = self
            .integrate_inv_supply_of
            .get(user)
            .copied()
            .unwrap_or_default();
        mul_div_u256(
            U256::from(self.balance_of(user)),
            inv.saturating_sub(inv_of),
            U256::from(UNIT),
        )
        .and_then(u256_to_u128)
        .ok_or(MinterError::Overflow)
    }
}

impl RewardGauge for LiquidityGauge {
    fn address(&self) -> &Address {
        &self.address
    }

    fn user_checkpoint(
        &mut self,
        user: &Address,
        schedule: &mut EmissionSchedule,
        controller: &mut GaugeController,
        now: Timestamp,
    ) -> Result<bool, MinterError> {
        schedule.catch_up(now)?;
        controller.checkpoint_gauge(&self.address, now)?;

        let (inv, reached) = self.accrue(schedule, controller, now)?;
        self.integrate_inv_supply = inv;
        self.period_timestamp = reached;

        let delta = self.user_delta(user, inv)?;
        let fraction = self
            .integrate_fraction(user)
            .checked_add(delta)
            .ok_or(MinterError::Overflow)?;
        self.integrate_fraction.insert(user.clone(), fraction);
        self.integrate_inv_supply_of.insert(user.clone(), inv);
        self.integrate_checkpoint_of.insert(user.clone(), reached);

        let caught_up = reached >= now;
        debug!(gauge = %self.address, user = %user, fraction, period = %reached, caught_up, "gauge checkpoint");
        Ok(caught_up)
    }

    fn integrate_fraction(&self, user: &Address) -> u128 {
        self.integrate_fraction.get(user).copied().unwrap_or(0)
    }
}
