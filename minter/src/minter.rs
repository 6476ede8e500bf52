//! The Emission Minter.

use crate::error::MinterError;
use crate::gauge::RewardGauge;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;
use vegov_emission::EmissionSchedule;
use vegov_gauges::GaugeController;
use vegov_types::{Address, MintableToken, Timestamp};

/// Everything a mint reads or writes besides the gauge itself.
pub struct MintContext<'a, T> {
    pub schedule: &'a mut EmissionSchedule,
    pub controller: &'a mut GaugeController,
    pub token: &'a mut T,
    pub now: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Minter {
    /// user -> gauge -> amount already paid.
    minted: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// minting address -> users who let it mint for them.
    allowed_to_mint_for: BTreeMap<Address, BTreeSet<Address>>,
}

impl Minter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minted(&self, user: &Address, gauge: &Address) -> u128 {
        self.minted
            .get(user)
            .and_then(|m| m.get(gauge))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowed_to_mint_for(&self, minting_user: &Address, for_user: &Address) -> bool {
        self.allowed_to_mint_for
            .get(minting_user)
            .is_some_and(|users| users.contains(for_user))
    }

    /// Flip whether `minting_user` may mint on behalf of `user`. Returns the
    /// new setting.
    pub fn toggle_approve_mint(&mut self, user: &Address, minting_user: &Address) -> bool {
        let users = self.allowed_to_mint_for.entry(minting_user.clone()).or_default();
        let approved = if users.remove(user) {
            false
        } else {
            users.insert(user.clone());
            true
        };
        info!(user = %user, minting_user = %minting_user, approved, "mint approval toggled");
        approved
    }

    /// Mint everything `caller` has earned in `gauge`.
    pub fn mint<G, T>(
        &mut self,
        caller: &Address,
        gauge: &mut G,
        ctx: &mut MintContext<'_, T>,
    ) -> Result<u128, MinterError>
    where
        G: RewardGauge,
        T: MintableToken,
    {
        self.mint_to(caller, gauge, ctx)
    }

    /// Mint for `caller` across several gauges; returns the total paid.
    pub fn mint_many<'g, G, T>(
        &mut self,
        caller: &Address,
        gauges: impl IntoIterator<Item = &'g mut G>,
        ctx: &mut MintContext<'_, T>,
    ) -> Result<u128, MinterError>
    where
        G: RewardGauge + 'g,
        T: MintableToken,
    {
        let mut total: u128 = 0;
        for gauge in gauges {
            let paid = self.mint_to(caller, gauge, ctx)?;
            total = total.checked_add(paid).ok_or(MinterError::Overflow)?;
        }
        Ok(total)
    }

    /// Mint on behalf of `for_user`, who must have approved `caller`.
    pub fn mint_for<G, T>(
        &mut self,
        caller: &Address,
        gauge: &mut G,
        for_user: &Address,
        ctx: &mut MintContext<'_, T>,
    ) -> Result<u128, MinterError>
    where
        G: RewardGauge,
        T: MintableToken,
    {
        if !self.allowed_to_mint_for(caller, for_user) {
            return Err(MinterError::NotApproved {
                caller: caller.clone(),
                for_user: for_user.clone(),
            });
        }
        self.mint_to(for_user, gauge, ctx)
    }

    fn mint_to<G, T>(
        &mut self,
        user: &Address,
        gauge: &mut G,
        ctx: &mut MintContext<'_, T>,
    ) -> Result<u128, MinterError>
    where
        G: RewardGauge,
        T: MintableToken,
    {
        let gauge_addr = gauge.address().clone();
        if !ctx.controller.is_gauge(&gauge_addr) {
            return Err(MinterError::GaugeNotRegistered(gauge_addr));
        }
        gauge.user_checkpoint(user, ctx.schedule, ctx.controller, ctx.now)?;
        let earned = gauge.integrate_fraction(user);
        let already = self.minted(user, &gauge_addr);
        let to_mint = earned.saturating_sub(already);
        if to_mint == 0 {
            return Ok(0);
        }

        ctx.schedule.record_mint(to_mint, ctx.now)?;
        self.minted
            .entry(user.clone())
            .or_default()
            .insert(gauge_addr.clone(), earned);

        ctx.token.mint(user, to_mint)?;
        info!(user = %user, gauge = %gauge_addr, amount = to_mint, total = earned, "minted");
        Ok(to_mint)
    }
}
