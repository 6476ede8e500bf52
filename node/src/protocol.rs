//! The protocol orchestrator.
//!
//! [`Protocol`] owns every component together with the token ledgers they
//! move and a [`Clock`]. Each mutating call runs through `transact`: the parts
//! of the state the call names are copied, the call applied, and on any error
//! the copies are put back, so a failed call leaves no trace in any component
//! or ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vegov_emission::EmissionSchedule;
use vegov_escrow::VotingEscrow;
use vegov_fees::FeeDistributor;
use vegov_gauges::{GaugeController, GaugeTypeId};
use vegov_minter::{LiquidityGauge, MintContext, Minter, RewardGauge};
use vegov_types::{Address, Classify, Clock, MintableToken, Role, Timestamp};

use crate::config::{DeploymentConfig, NodeConfig};
use crate::metrics::{whole_tokens, ProtocolMetrics};
use crate::NodeError;

/// Components that hold admin roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Escrow,
    Gauges,
    Fees,
}

/// Everything a call can change. Serialized by snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolState<T> {
    pub escrow: VotingEscrow,
    pub schedule: EmissionSchedule,
    pub controller: GaugeController,
    /// Staking gauges, keyed by the address registered with the controller.
    pub gauges: BTreeMap<Address, LiquidityGauge>,
    pub minter: Minter,
    pub distributor: FeeDistributor,
    /// Governance token: locked in the escrow and minted as reward.
    pub token: T,
    pub fee_token: T,
    /// One LP-token ledger per staking gauge.
    pub lp_tokens: BTreeMap<Address, T>,
}

enum Ledger {
    Governance,
    Fee,
    Lp(Address),
}

/// A piece of [`ProtocolState`] a call may change.
#[derive(Clone, Copy, Debug)]
enum Part<'a> {
    Escrow,
    Schedule,
    Controller,
    Minter,
    Distributor,
    Token,
    FeeToken,
    Gauge(&'a Address),
    Lp(&'a Address),
}

/// Copies of the parts a call touches, taken before it runs.
struct Undo<T> {
    escrow: Option<VotingEscrow>,
    schedule: Option<EmissionSchedule>,
    controller: Option<GaugeController>,
    minter: Option<Minter>,
    distributor: Option<FeeDistributor>,
    token: Option<T>,
    fee_token: Option<T>,
    /// `None` restores an entry the call created by removing it.
    gauges: Vec<(Address, Option<LiquidityGauge>)>,
    lp_tokens: Vec<(Address, Option<T>)>,
}

impl<T: Clone> Undo<T> {
    fn save(state: &ProtocolState<T>, parts: &[Part<'_>]) -> Self {
        let mut undo = Self {
            escrow: None,
            schedule: None,
            controller: None,
            minter: None,
            distributor: None,
            token: None,
            fee_token: None,
            gauges: Vec::new(),
            lp_tokens: Vec::new(),
        };
        for part in parts {
            match *part {
                Part::Escrow => undo.escrow = Some(state.escrow.clone()),
                Part::Schedule => undo.schedule = Some(state.schedule.clone()),
                Part::Controller => undo.controller = Some(state.controller.clone()),
                Part::Minter => undo.minter = Some(state.minter.clone()),
                Part::Distributor => undo.distributor = Some(state.distributor.clone()),
                Part::Token => undo.token = Some(state.token.clone()),
                Part::FeeToken => undo.fee_token = Some(state.fee_token.clone()),
                Part::Gauge(a) => undo.gauges.push((a.clone(), state.gauges.get(a).cloned())),
                Part::Lp(a) => undo.lp_tokens.push((a.clone(), state.lp_tokens.get(a).cloned())),
            }
        }
        undo
    }

    fn restore(self, state: &mut ProtocolState<T>) {
        if let Some(escrow) = self.escrow {
            state.escrow = escrow;
        }
        if let Some(schedule) = self.schedule {
            state.schedule = schedule;
        }
        if let Some(controller) = self.controller {
            state.controller = controller;
        }
        if let Some(minter) = self.minter {
            state.minter = minter;
        }
        if let Some(distributor) = self.distributor {
            state.distributor = distributor;
        }
        if let Some(token) = self.token {
            state.token = token;
        }
        if let Some(fee_token) = self.fee_token {
            state.fee_token = fee_token;
        }
        // reversed so the oldest copy of a repeated entry wins
        for (address, saved) in self.gauges.into_iter().rev() {
            match saved {
                Some(g) => state.gauges.insert(address, g),
                None => state.gauges.remove(&address),
            };
        }
        for (address, saved) in self.lp_tokens.into_iter().rev() {
            match saved {
                Some(lp) => state.lp_tokens.insert(address, lp),
                None => state.lp_tokens.remove(&address),
            };
        }
    }
}

fn role_holder(component: Component) -> Part<'static> {
    match component {
        Component::Escrow => Part::Escrow,
        Component::Gauges => Part::Controller,
        Component::Fees => Part::Distributor,
    }
}

pub struct Protocol<T, C> {
    state: ProtocolState<T>,
    deployment: DeploymentConfig,
    clock: C,
    metrics: Option<ProtocolMetrics>,
    snapshot_path: Option<PathBuf>,
}

impl<T, C> Protocol<T, C>
where
    T: MintableToken + Clone + Default + Serialize + DeserializeOwned,
    C: Clock,
{
    /// Deploy every component at the clock's current time.
    pub fn new(config: &NodeConfig, token: T, fee_token: T, clock: C) -> Result<Self, NodeError> {
        let now = clock.now();
        let d = &config.deployment;
        let params = &config.params;
        let state = ProtocolState {
            escrow: VotingEscrow::new(d.escrow.clone(), &d.admin, params.clone(), now),
            schedule: EmissionSchedule::new(params.clone(), now),
            controller: GaugeController::new(&d.admin, params.clone()),
            gauges: BTreeMap::new(),
            minter: Minter::new(),
            distributor: FeeDistributor::new(
                d.fee_distributor.clone(),
                d.fee_token.clone(),
                &d.admin,
                d.emergency_return.clone(),
                params.clone(),
                now,
            ),
            token,
            fee_token,
            lp_tokens: BTreeMap::new(),
        };
        info!(admin = %d.admin, at = now.as_secs(), "protocol deployed");
        Self::assemble(config, state, clock)
    }

    /// Rebuild a node from a [`Protocol::snapshot`].
    pub fn from_snapshot(config: &NodeConfig, bytes: &[u8], clock: C) -> Result<Self, NodeError> {
        let state: ProtocolState<T> = bincode::deserialize(bytes)?;
        info!(bytes = bytes.len(), "protocol restored from snapshot");
        Self::assemble(config, state, clock)
    }

    pub fn load_snapshot(config: &NodeConfig, path: &Path, clock: C) -> Result<Self, NodeError> {
        let bytes = std::fs::read(path)?;
        Self::from_snapshot(config, &bytes, clock)
    }

    /// Restore from the configured snapshot file when one exists, otherwise
    /// deploy fresh with the given ledgers.
    pub fn open(config: &NodeConfig, token: T, fee_token: T, clock: C) -> Result<Self, NodeError> {
        match &config.snapshot_path {
            Some(path) if path.exists() => Self::load_snapshot(config, path, clock),
            _ => Self::new(config, token, fee_token, clock),
        }
    }

    /// Write a snapshot to the configured path. Returns `false` when no path
    /// is configured.
    pub fn persist(&self) -> Result<bool, NodeError> {
        match &self.snapshot_path {
            Some(path) => {
                self.save_snapshot(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn assemble(config: &NodeConfig, state: ProtocolState<T>, clock: C) -> Result<Self, NodeError> {
        let metrics = if config.enable_metrics {
            Some(ProtocolMetrics::new()?)
        } else {
            None
        };
        Ok(Self {
            state,
            deployment: config.deployment.clone(),
            clock,
            metrics,
            snapshot_path: config.snapshot_path.clone(),
        })
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, NodeError> {
        Ok(bincode::serialize(&self.state)?)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), NodeError> {
        std::fs::write(path, self.snapshot()?)?;
        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> &ProtocolState<T> {
        &self.state
    }

    pub fn deployment(&self) -> &DeploymentConfig {
        &self.deployment
    }

    pub fn metrics(&self) -> Option<&ProtocolMetrics> {
        self.metrics.as_ref()
    }

    /// Current voting power of `user`.
    pub fn balance_of(&self, user: &Address) -> u128 {
        self.state.escrow.balance_of(user, self.now())
    }

    pub fn total_supply(&self) -> u128 {
        self.state.escrow.total_supply(self.now())
    }

    pub fn gauge_relative_weight(&self, gauge: &Address) -> u128 {
        self.state.controller.gauge_relative_weight(gauge, self.now())
    }

    /// Emission `user` could mint from `gauge` right now.
    pub fn claimable_tokens(&self, gauge: &Address, user: &Address) -> Result<u128, NodeError> {
        let s = &self.state;
        let g = s
            .gauges
            .get(gauge)
            .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
        Ok(g.claimable_tokens(user, &s.minter, &s.schedule, &s.controller, self.now())?)
    }

    pub fn available_supply(&self) -> Result<u128, NodeError> {
        Ok(self.state.schedule.available_supply(self.now())?)
    }

    /// The host's handle on the external token ledgers.
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.state.token
    }

    pub fn fee_token_mut(&mut self) -> &mut T {
        &mut self.state.fee_token
    }

    pub fn lp_token_mut(&mut self, gauge: &Address) -> Option<&mut T> {
        self.state.lp_tokens.get_mut(gauge)
    }

    // ── Escrow ──────────────────────────────────────────────────────────

    pub fn create_lock(&mut self, user: &Address, amount: u128, unlock_time: Timestamp) -> Result<(), NodeError> {
        self.transact("create_lock", &[Part::Escrow, Part::Token], |s, now| {
            Ok(s.escrow.create_lock(user, amount, unlock_time, &mut s.token, now)?)
        })?;
        self.record(|m| m.tokens_locked.inc_by(whole_tokens(amount)));
        Ok(())
    }

    pub fn increase_amount(&mut self, user: &Address, extra: u128) -> Result<(), NodeError> {
        self.transact("increase_amount", &[Part::Escrow, Part::Token], |s, now| {
            Ok(s.escrow.increase_amount(user, extra, &mut s.token, now)?)
        })?;
        self.record(|m| m.tokens_locked.inc_by(whole_tokens(extra)));
        Ok(())
    }

    pub fn deposit_for(&mut self, payer: &Address, who: &Address, extra: u128) -> Result<(), NodeError> {
        self.transact("deposit_for", &[Part::Escrow, Part::Token], |s, now| {
            Ok(s.escrow.deposit_for(payer, who, extra, &mut s.token, now)?)
        })?;
        self.record(|m| m.tokens_locked.inc_by(whole_tokens(extra)));
        Ok(())
    }

    pub fn increase_unlock_time(&mut self, user: &Address, unlock_time: Timestamp) -> Result<(), NodeError> {
        self.transact("increase_unlock_time", &[Part::Escrow, Part::Token], |s, now| {
            Ok(s.escrow.increase_unlock_time(user, unlock_time, &mut s.token, now)?)
        })
    }

    pub fn withdraw(&mut self, user: &Address) -> Result<u128, NodeError> {
        let amount = self.transact("withdraw", &[Part::Escrow, Part::Token], |s, now| Ok(s.escrow.withdraw(user, &mut s.token, now)?))?;
        self.record(|m| m.tokens_withdrawn.inc_by(whole_tokens(amount)));
        Ok(amount)
    }

    /// Catch the global escrow history up. Returns whether it reached now.
    pub fn checkpoint_escrow(&mut self) -> Result<bool, NodeError> {
        self.transact("checkpoint_escrow", &[Part::Escrow], |s, now| Ok(s.escrow.checkpoint(now)))
    }

    pub fn set_emergency_unlock(&mut self, caller: &Address, on: bool) -> Result<(), NodeError> {
        self.transact("set_emergency_unlock", &[Part::Escrow], |s, _| Ok(s.escrow.set_emergency_unlock(caller, on)?))
    }

    // ── Gauge registry ──────────────────────────────────────────────────

    pub fn add_type(&mut self, caller: &Address, name: &str, weight: u128) -> Result<GaugeTypeId, NodeError> {
        self.transact("add_type", &[Part::Controller], |s, now| Ok(s.controller.add_type(caller, name, weight, now)?))
    }

    /// Register `gauge` with the controller and deploy its staking gauge and
    /// LP ledger.
    pub fn add_gauge(
        &mut self,
        caller: &Address,
        gauge: &Address,
        type_id: GaugeTypeId,
        weight: u128,
    ) -> Result<(), NodeError> {
        self.transact("add_gauge", &[Part::Controller, Part::Gauge(gauge), Part::Lp(gauge)], |s, now| {
            s.controller.add_gauge(caller, gauge, type_id, weight, now)?;
            let max_weeks = s.escrow.params().gauge_checkpoint_weeks;
            s.gauges
                .insert(gauge.clone(), LiquidityGauge::new(gauge.clone(), max_weeks, now));
            s.lp_tokens.entry(gauge.clone()).or_default();
            Ok(())
        })
    }

    pub fn change_type_weight(&mut self, caller: &Address, type_id: GaugeTypeId, weight: u128) -> Result<(), NodeError> {
        self.transact("change_type_weight", &[Part::Controller], |s, now| {
            Ok(s.controller.change_type_weight(caller, type_id, weight, now)?)
        })
    }

    pub fn change_gauge_weight(&mut self, caller: &Address, gauge: &Address, weight: u128) -> Result<(), NodeError> {
        self.transact("change_gauge_weight", &[Part::Controller], |s, now| {
            Ok(s.controller.change_gauge_weight(caller, gauge, weight, now)?)
        })
    }

    pub fn vote_for_gauge_weights(&mut self, user: &Address, gauge: &Address, weight_bps: u32) -> Result<(), NodeError> {
        self.transact("vote_for_gauge_weights", &[Part::Controller], |s, now| {
            Ok(s.controller.vote_for_gauge_weights(user, gauge, weight_bps, &s.escrow, now)?)
        })
    }

    pub fn checkpoint_gauges(&mut self) -> Result<bool, NodeError> {
        self.transact("checkpoint_gauges", &[Part::Controller], |s, now| Ok(s.controller.checkpoint(now)))
    }

    pub fn checkpoint_gauge(&mut self, gauge: &Address) -> Result<bool, NodeError> {
        self.transact("checkpoint_gauge", &[Part::Controller], |s, now| Ok(s.controller.checkpoint_gauge(gauge, now)?))
    }

    pub fn gauge_relative_weight_write(&mut self, gauge: &Address) -> Result<u128, NodeError> {
        self.transact("gauge_relative_weight_write", &[Part::Controller], |s, now| {
            Ok(s.controller.gauge_relative_weight_write(gauge, now)?)
        })
    }

    // ── Emission ────────────────────────────────────────────────────────

    pub fn update_mining_parameters(&mut self) -> Result<(), NodeError> {
        self.transact("update_mining_parameters", &[Part::Schedule], |s, now| {
            Ok(s.schedule.update_mining_parameters(now)?)
        })
    }

    pub fn future_epoch_time_write(&mut self) -> Result<Timestamp, NodeError> {
        self.transact("future_epoch_time_write", &[Part::Schedule], |s, now| {
            Ok(s.schedule.future_epoch_time_write(now)?)
        })
    }

    // ── Staking gauges and minter ───────────────────────────────────────

    /// Stake `amount` of `gauge`'s LP token.
    pub fn gauge_deposit(&mut self, user: &Address, gauge: &Address, amount: u128) -> Result<(), NodeError> {
        self.transact("gauge_deposit", &[Part::Gauge(gauge), Part::Lp(gauge), Part::Schedule, Part::Controller], |s, now| {
            let g = s
                .gauges
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            let lp = s
                .lp_tokens
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            Ok(g.deposit(user, amount, lp, &mut s.schedule, &mut s.controller, now)?)
        })
    }

    pub fn gauge_withdraw(&mut self, user: &Address, gauge: &Address, amount: u128) -> Result<(), NodeError> {
        self.transact("gauge_withdraw", &[Part::Gauge(gauge), Part::Lp(gauge), Part::Schedule, Part::Controller], |s, now| {
            let g = s
                .gauges
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            let lp = s
                .lp_tokens
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            Ok(g.withdraw(user, amount, lp, &mut s.schedule, &mut s.controller, now)?)
        })
    }

    pub fn user_checkpoint(&mut self, gauge: &Address, user: &Address) -> Result<bool, NodeError> {
        self.transact("user_checkpoint", &[Part::Gauge(gauge), Part::Schedule, Part::Controller], |s, now| {
            let g = s
                .gauges
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            Ok(g.user_checkpoint(user, &mut s.schedule, &mut s.controller, now)?)
        })
    }

    pub fn mint(&mut self, caller: &Address, gauge: &Address) -> Result<u128, NodeError> {
        let minted = self.transact("mint", &[Part::Gauge(gauge), Part::Schedule, Part::Controller, Part::Minter, Part::Token], |s, now| {
            let g = s
                .gauges
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            let mut ctx = MintContext {
                schedule: &mut s.schedule,
                controller: &mut s.controller,
                token: &mut s.token,
                now,
            };
            Ok(s.minter.mint(caller, g, &mut ctx)?)
        })?;
        self.record(|m| m.rewards_minted.inc_by(whole_tokens(minted)));
        Ok(minted)
    }

    /// Mint from several gauges at once. Each gauge is minted at most once.
    pub fn mint_many(&mut self, caller: &Address, gauges: &[Address]) -> Result<u128, NodeError> {
        let mut parts: Vec<Part<'_>> = gauges.iter().map(Part::Gauge).collect();
        parts.extend([Part::Schedule, Part::Controller, Part::Minter, Part::Token]);
        let minted = self.transact("mint_many", &parts, |s, now| {
            if let Some(missing) = gauges.iter().find(|g| !s.gauges.contains_key(*g)) {
                return Err(NodeError::UnknownGauge(missing.clone()));
            }
            let wanted: BTreeSet<&Address> = gauges.iter().collect();
            let targets = s
                .gauges
                .iter_mut()
                .filter(|(a, _)| wanted.contains(a))
                .map(|(_, g)| g);
            let mut ctx = MintContext {
                schedule: &mut s.schedule,
                controller: &mut s.controller,
                token: &mut s.token,
                now,
            };
            Ok(s.minter.mint_many(caller, targets, &mut ctx)?)
        })?;
        self.record(|m| m.rewards_minted.inc_by(whole_tokens(minted)));
        Ok(minted)
    }

    pub fn mint_for(&mut self, caller: &Address, gauge: &Address, for_user: &Address) -> Result<u128, NodeError> {
        let minted = self.transact("mint_for", &[Part::Gauge(gauge), Part::Schedule, Part::Controller, Part::Minter, Part::Token], |s, now| {
            let g = s
                .gauges
                .get_mut(gauge)
                .ok_or_else(|| NodeError::UnknownGauge(gauge.clone()))?;
            let mut ctx = MintContext {
                schedule: &mut s.schedule,
                controller: &mut s.controller,
                token: &mut s.token,
                now,
            };
            Ok(s.minter.mint_for(caller, g, for_user, &mut ctx)?)
        })?;
        self.record(|m| m.rewards_minted.inc_by(whole_tokens(minted)));
        Ok(minted)
    }

    pub fn toggle_approve_mint(&mut self, user: &Address, minting_user: &Address) -> Result<bool, NodeError> {
        self.transact("toggle_approve_mint", &[Part::Minter], |s, _| {
            Ok(s.minter.toggle_approve_mint(user, minting_user))
        })
    }

    // ── Fee distributor ─────────────────────────────────────────────────

    /// Send fee tokens to the distributor. They count once the token is
    /// checkpointed.
    pub fn deposit_fees(&mut self, payer: &Address, amount: u128) -> Result<(), NodeError> {
        self.transact("deposit_fees", &[Part::FeeToken], |s, _| {
            let to = s.distributor.address().clone();
            Ok(s.fee_token.transfer(payer, &to, amount)?)
        })
    }

    pub fn checkpoint_token(&mut self, caller: &Address) -> Result<(), NodeError> {
        self.transact("checkpoint_token", &[Part::Distributor], |s, now| {
            Ok(s.distributor.checkpoint_token(caller, &s.fee_token, &s.escrow, now)?)
        })
    }

    pub fn checkpoint_total_supply(&mut self) -> Result<(), NodeError> {
        self.transact("checkpoint_total_supply", &[Part::Distributor], |s, now| {
            Ok(s.distributor.checkpoint_total_supply(&s.escrow, now)?)
        })
    }

    pub fn claim(&mut self, user: &Address) -> Result<u128, NodeError> {
        let paid = self.transact("claim", &[Part::Distributor, Part::FeeToken], |s, now| {
            Ok(s.distributor.claim(user, &mut s.fee_token, &s.escrow, now)?)
        })?;
        self.record(|m| m.fees_claimed.inc_by(whole_tokens(paid)));
        Ok(paid)
    }

    pub fn claim_many(&mut self, users: &[Address]) -> Result<u128, NodeError> {
        let paid = self.transact("claim_many", &[Part::Distributor, Part::FeeToken], |s, now| {
            Ok(s.distributor.claim_many(users, &mut s.fee_token, &s.escrow, now)?)
        })?;
        self.record(|m| m.fees_claimed.inc_by(whole_tokens(paid)));
        Ok(paid)
    }

    pub fn toggle_allow_checkpoint_token(&mut self, caller: &Address) -> Result<bool, NodeError> {
        self.transact("toggle_allow_checkpoint_token", &[Part::Distributor], |s, _| {
            Ok(s.distributor.toggle_allow_checkpoint_token(caller)?)
        })
    }

    pub fn kill_fee_distributor(&mut self, caller: &Address) -> Result<u128, NodeError> {
        self.transact("kill_fee_distributor", &[Part::Distributor, Part::FeeToken], |s, _| {
            Ok(s.distributor.kill(caller, &mut s.fee_token)?)
        })
    }

    /// Return a token the distributor holds by mistake to the emergency
    /// address. `coin` names the governance token, the fee token or a
    /// gauge's LP token.
    pub fn recover_balance(&mut self, caller: &Address, coin: &Address) -> Result<u128, NodeError> {
        let ledger = self.ledger_of(coin);
        let moved = match &ledger {
            Some(Ledger::Governance) => Part::Token,
            Some(Ledger::Fee) => Part::FeeToken,
            Some(Ledger::Lp(_)) => Part::Lp(coin),
            None => Part::Distributor,
        };
        self.transact("recover_balance", &[Part::Distributor, moved], |s, _| {
            let ledger = match ledger {
                Some(Ledger::Governance) => &mut s.token,
                Some(Ledger::Fee) => &mut s.fee_token,
                Some(Ledger::Lp(gauge)) => s
                    .lp_tokens
                    .get_mut(&gauge)
                    .ok_or_else(|| NodeError::UnknownToken(coin.clone()))?,
                None => return Err(NodeError::UnknownToken(coin.clone())),
            };
            Ok(s.distributor.recover_balance(caller, coin, ledger)?)
        })
    }

    // ── Roles ───────────────────────────────────────────────────────────

    pub fn commit_role(
        &mut self,
        component: Component,
        role: Role,
        caller: &Address,
        new_holder: &Address,
    ) -> Result<(), NodeError> {
        self.transact("commit_role", &[role_holder(component)], |s, _| match component {
            Component::Escrow => Ok(s.escrow.commit_role(role, caller, new_holder)?),
            Component::Gauges => Ok(s.controller.commit_role(role, caller, new_holder)?),
            Component::Fees => Ok(s.distributor.commit_role(role, caller, new_holder)?),
        })
    }

    pub fn apply_role(&mut self, component: Component, role: Role, caller: &Address) -> Result<(), NodeError> {
        self.transact("apply_role", &[role_holder(component)], |s, _| match component {
            Component::Escrow => Ok(s.escrow.apply_role(role, caller)?),
            Component::Gauges => Ok(s.controller.apply_role(role, caller)?),
            Component::Fees => Ok(s.distributor.apply_role(role, caller)?),
        })
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Apply `f` to the state, or leave the state untouched if it fails.
    /// `f` may only change the listed `parts`.
    fn transact<R>(
        &mut self,
        op: &'static str,
        parts: &[Part<'_>],
        f: impl FnOnce(&mut ProtocolState<T>, Timestamp) -> Result<R, NodeError>,
    ) -> Result<R, NodeError> {
        let now = self.clock.now();
        let saved = Undo::save(&self.state, parts);
        match f(&mut self.state, now) {
            Ok(out) => {
                debug!(op, at = now.as_secs(), "call committed");
                self.record(|m| m.calls_committed.inc());
                Ok(out)
            }
            Err(err) => {
                saved.restore(&mut self.state);
                warn!(op, at = now.as_secs(), kind = ?err.kind(), error = %err, "call rolled back");
                self.record(|m| m.calls_rolled_back.inc());
                Err(err)
            }
        }
    }

    fn record(&self, f: impl FnOnce(&ProtocolMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    fn ledger_of(&self, coin: &Address) -> Option<Ledger> {
        if *coin == self.deployment.governance_token {
            Some(Ledger::Governance)
        } else if *coin == self.deployment.fee_token {
            Some(Ledger::Fee)
        } else if self.state.lp_tokens.contains_key(coin) {
            Some(Ledger::Lp(coin.clone()))
        } else {
            None
        }
    }
}
