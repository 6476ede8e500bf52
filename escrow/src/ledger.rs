//! The Escrow Ledger.
//!
//! Users lock the governance token until a week-aligned unlock time and
//! receive voting power that decays linearly to zero at that time. Every
//! mutation records a point in the user's history and folds the change into
//! the global [`SupplyHistory`].

use crate::error::EscrowError;
use crate::history::SupplyHistory;
use crate::lock::LockedBalance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vegov_types::{
    Address, AdminRoles, FungibleToken, Point, ProtocolParams, Role, Timestamp, TokenError,
};

/// Which user operation produced a deposit; carried into logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DepositKind {
    CreateLock,
    IncreaseAmount,
    IncreaseUnlockTime,
    DepositFor,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotingEscrow {
    /// Account that holds locked principal.
    address: Address,
    params: ProtocolParams,
    /// Total principal currently held.
    supply: u128,
    locked: BTreeMap<Address, LockedBalance>,
    history: SupplyHistory,
    user_point_history: BTreeMap<Address, Vec<Point>>,
    roles: AdminRoles,
    emergency_unlock: bool,
}

impl VotingEscrow {
    pub fn new(address: Address, admin: &Address, params: ProtocolParams, now: Timestamp) -> Self {
        let history = SupplyHistory::new(now, params.escrow_checkpoint_weeks);
        Self {
            address,
            params,
            supply: 0,
            locked: BTreeMap::new(),
            history,
            user_point_history: BTreeMap::new(),
            roles: AdminRoles::new(admin),
            emergency_unlock: false,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn roles(&self) -> &AdminRoles {
        &self.roles
    }

    /// Total principal held by the escrow.
    pub fn supply(&self) -> u128 {
        self.supply
    }

    pub fn locked(&self, user: &Address) -> LockedBalance {
        self.locked.get(user).copied().unwrap_or_default()
    }

    pub fn locked_end(&self, user: &Address) -> Timestamp {
        self.locked(user).end
    }

    /// Slope of the user's latest line.
    pub fn last_user_slope(&self, user: &Address) -> i128 {
        self.last_user_point(user).map(|p| p.slope).unwrap_or(0)
    }

    pub fn last_user_point(&self, user: &Address) -> Option<Point> {
        self.user_point_history.get(user).and_then(|h| h.last().copied())
    }

    /// Number of points recorded for `user`.
    pub fn user_point_epoch(&self, user: &Address) -> usize {
        self.user_point_history.get(user).map_or(0, Vec::len)
    }

    pub fn user_point(&self, user: &Address, epoch: usize) -> Option<Point> {
        self.user_point_history.get(user).and_then(|h| h.get(epoch).copied())
    }

    /// Index of the latest global point.
    pub fn epoch(&self) -> usize {
        self.history.epoch()
    }

    pub fn point_history(&self, epoch: usize) -> Option<Point> {
        self.history.point(epoch).copied()
    }

    pub fn slope_change(&self, week: Timestamp) -> i128 {
        self.history.slope_change(week)
    }

    pub fn emergency_unlock(&self) -> bool {
        self.emergency_unlock
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Voting power of `user` at `t`.
    pub fn balance_of(&self, user: &Address, t: Timestamp) -> u128 {
        self.balance_of_at(user, t)
    }

    /// Voting power of `user` at any time, from the latest user point not
    /// after `t`. Zero before the user's first lock.
    pub fn balance_of_at(&self, user: &Address, t: Timestamp) -> u128 {
        let Some(points) = self.user_point_history.get(user) else {
            return 0;
        };
        let idx = points.partition_point(|p| p.ts <= t);
        if idx == 0 {
            return 0;
        }
        u128::try_from(points[idx - 1].value_at(t)).unwrap_or(0)
    }

    /// Aggregate voting power at `t`.
    pub fn total_supply(&self, t: Timestamp) -> u128 {
        self.history.supply_at(t)
    }

    /// Aggregate voting power at any time since deployment.
    pub fn total_supply_at(&self, t: Timestamp) -> u128 {
        self.history.supply_at(t)
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Catch the global history up to `now`. Returns `false` when more weeks
    /// remain than one call may replay.
    pub fn checkpoint(&mut self, now: Timestamp) -> bool {
        let caught_up = self.history.advance(now);
        debug!(epoch = self.history.epoch(), caught_up, "escrow checkpoint");
        caught_up
    }

    pub fn create_lock(
        &mut self,
        user: &Address,
        amount: u128,
        unlock_time: Timestamp,
        token: &mut impl FungibleToken,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let unlock = unlock_time.week_floor();
        let old = self.locked(user);
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        if old.exists() {
            return Err(EscrowError::LockExists(user.clone()));
        }
        if unlock <= now {
            return Err(EscrowError::UnlockTimeNotInFuture { unlock, now });
        }
        self.ensure_within_horizon(unlock, now)?;
        self.deposit(user, user, amount, Some(unlock), old, token, now, DepositKind::CreateLock)
    }

    pub fn increase_amount(
        &mut self,
        user: &Address,
        extra: u128,
        token: &mut impl FungibleToken,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let old = self.active_lock(user, now)?;
        if extra == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        self.deposit(user, user, extra, None, old, token, now, DepositKind::IncreaseAmount)
    }

    /// Add `extra` from `payer` to the existing lock of `who`.
    pub fn deposit_for(
        &mut self,
        payer: &Address,
        who: &Address,
        extra: u128,
        token: &mut impl FungibleToken,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let old = self.active_lock(who, now)?;
        if extra == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        self.deposit(payer, who, extra, None, old, token, now, DepositKind::DepositFor)
    }

    pub fn increase_unlock_time(
        &mut self,
        user: &Address,
        unlock_time: Timestamp,
        token: &mut impl FungibleToken,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let old = self.active_lock(user, now)?;
        let unlock = unlock_time.week_floor();
        if unlock <= old.end {
            return Err(EscrowError::UnlockTimeNotIncreasing {
                current: old.end,
                requested: unlock,
            });
        }
        self.ensure_within_horizon(unlock, now)?;
        self.deposit(user, user, 0, Some(unlock), old, token, now, DepositKind::IncreaseUnlockTime)
    }

    /// Return the full principal once the lock has expired (or at any time
    /// while emergency unlock is on).
    pub fn withdraw(
        &mut self,
        user: &Address,
        token: &mut impl FungibleToken,
        now: Timestamp,
    ) -> Result<u128, EscrowError> {
        let old = self.locked(user);
        if !old.exists() {
            return Err(EscrowError::NoLock(user.clone()));
        }
        if !old.is_expired(now) && !self.emergency_unlock {
            return Err(EscrowError::LockNotExpired { unlock: old.end });
        }
        let vault_balance = token.balance_of(&self.address);
        if vault_balance < old.amount {
            return Err(TokenError::InsufficientBalance {
                needed: old.amount,
                available: vault_balance,
            }
            .into());
        }

        self.sync(now)?;
        let new = LockedBalance::default();
        self.checkpoint_user(user, &old, &new, now)?;
        self.locked.insert(user.clone(), new);
        self.supply = self.supply.checked_sub(old.amount).ok_or(EscrowError::Overflow)?;

        token.transfer(&self.address, user, old.amount)?;
        info!(user = %user, amount = old.amount, supply = self.supply, "withdraw");
        Ok(old.amount)
    }

    pub fn set_emergency_unlock(&mut self, caller: &Address, on: bool) -> Result<(), EscrowError> {
        self.roles.ensure(Role::Emergency, caller)?;
        self.emergency_unlock = on;
        info!(caller = %caller, on, "escrow emergency unlock");
        Ok(())
    }

    pub fn commit_role(&mut self, role: Role, caller: &Address, new_holder: &Address) -> Result<(), EscrowError> {
        self.roles.commit(role, caller, new_holder)?;
        Ok(())
    }

    pub fn apply_role(&mut self, role: Role, caller: &Address) -> Result<(), EscrowError> {
        self.roles.apply(role, caller)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn active_lock(&self, user: &Address, now: Timestamp) -> Result<LockedBalance, EscrowError> {
        let lock = self.locked(user);
        if !lock.exists() {
            return Err(EscrowError::NoLock(user.clone()));
        }
        if lock.is_expired(now) {
            return Err(EscrowError::LockExpired(user.clone()));
        }
        Ok(lock)
    }

    fn ensure_within_horizon(&self, unlock: Timestamp, now: Timestamp) -> Result<(), EscrowError> {
        let max = now.plus(self.params.max_lock_duration);
        if unlock > max {
            return Err(EscrowError::UnlockTimeTooLong { unlock, max });
        }
        Ok(())
    }

    fn sync(&mut self, now: Timestamp) -> Result<(), EscrowError> {
        if !self.history.advance(now) {
            return Err(EscrowError::CheckpointBehind {
                caught_up_to: self.history.last().ts,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn deposit(
        &mut self,
        payer: &Address,
        owner: &Address,
        value: u128,
        unlock: Option<Timestamp>,
        old: LockedBalance,
        token: &mut impl FungibleToken,
        now: Timestamp,
        kind: DepositKind,
    ) -> Result<(), EscrowError> {
        let available = token.balance_of(payer);
        if available < value {
            return Err(TokenError::InsufficientBalance {
                needed: value,
                available,
            }
            .into());
        }
        let new = LockedBalance {
            amount: old.amount.checked_add(value).ok_or(EscrowError::Overflow)?,
            end: unlock.unwrap_or(old.end),
        };
        let supply = self.supply.checked_add(value).ok_or(EscrowError::Overflow)?;

        self.sync(now)?;
        self.checkpoint_user(owner, &old, &new, now)?;
        self.locked.insert(owner.clone(), new);
        self.supply = supply;

        if value > 0 {
            token.transfer(payer, &self.address, value)?;
        }
        info!(
            ?kind,
            payer = %payer,
            user = %owner,
            amount = value,
            locked = new.amount,
            unlock_time = %new.end,
            supply = self.supply,
            "escrow deposit"
        );
        Ok(())
    }

    /// Record the user's new line and fold `old -> new` into the global history.
    fn checkpoint_user(
        &mut self,
        user: &Address,
        old: &LockedBalance,
        new: &LockedBalance,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let max = self.params.max_lock_duration;
        let u_old = Point::for_lock(old.amount, old.end, now, max).ok_or(EscrowError::Overflow)?;
        let u_new = Point::for_lock(new.amount, new.end, now, max).ok_or(EscrowError::Overflow)?;
        self.history.apply_user_change(&u_old, old.end, &u_new, new.end, now)?;

        let points = self.user_point_history.entry(user.clone()).or_default();
        match points.last_mut() {
            Some(last) if last.ts == now => *last = u_new,
            _ => points.push(u_new),
        }
        Ok(())
    }
}
