//! The emission schedule.

use crate::error::EmissionError;
use crate::history::RateHistory;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vegov_types::{mul_div, ProtocolParams, Timestamp, UNIT};

/// Global issuance rate with yearly reductions and a hard supply cap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmissionSchedule {
    params: ProtocolParams,
    deployed_at: Timestamp,
    rate: u128,
    /// `None` until the first epoch has started.
    mining_epoch: Option<u64>,
    start_epoch_time: Timestamp,
    /// When the current epoch ends (before launch: when the first begins).
    next_epoch_time: Timestamp,
    /// Issued by all epochs before the current one.
    start_epoch_supply: u128,
    total_minted: u128,
    exhausted: bool,
    history: RateHistory,
}

impl EmissionSchedule {
    pub fn new(params: ProtocolParams, now: Timestamp) -> Self {
        let next_epoch_time = now.plus(params.inflation_delay);
        Self {
            deployed_at: now,
            rate: 0,
            mining_epoch: None,
            start_epoch_time: next_epoch_time.minus(params.rate_reduction_time),
            next_epoch_time,
            start_epoch_supply: 0,
            total_minted: 0,
            exhausted: false,
            history: RateHistory::new(0, now),
            params,
        }
    }

    pub fn rate(&self) -> u128 {
        self.rate
    }

    pub fn mining_epoch(&self) -> Option<u64> {
        self.mining_epoch
    }

    pub fn start_epoch_time(&self) -> Timestamp {
        self.start_epoch_time
    }

    pub fn start_epoch_supply(&self) -> u128 {
        self.start_epoch_supply
    }

    /// Start of the next rate epoch.
    pub fn future_epoch_time(&self) -> Timestamp {
        self.next_epoch_time
    }

    pub fn total_minted(&self) -> u128 {
        self.total_minted
    }

    /// The supply cap has been reached; the rate stays zero.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn rate_history(&self) -> &RateHistory {
        &self.history
    }

    pub fn deployed_at(&self) -> Timestamp {
        self.deployed_at
    }

    /// Start the next rate epoch. Anyone may call once it is due.
    ///
    /// Once the cap is exhausted every call succeeds and changes nothing.
    pub fn update_mining_parameters(&mut self, now: Timestamp) -> Result<(), EmissionError> {
        if self.exhausted {
            debug!("emission exhausted; rate stays zero");
            return Ok(());
        }
        if now < self.next_epoch_time {
            return Err(match self.mining_epoch {
                None => EmissionError::LaunchDelay {
                    starts_at: self.next_epoch_time,
                },
                Some(_) => EmissionError::EpochNotElapsed {
                    next_epoch: self.next_epoch_time,
                },
            });
        }
        self.roll_epoch()
    }

    /// Perform every rollover due by `now`. Returns how many happened.
    pub fn catch_up(&mut self, now: Timestamp) -> Result<u32, EmissionError> {
        let mut rolled = 0;
        while !self.exhausted && now >= self.next_epoch_time {
            self.roll_epoch()?;
            rolled += 1;
        }
        Ok(rolled)
    }

    /// Roll over if due, then report when the current epoch ends.
    pub fn future_epoch_time_write(&mut self, now: Timestamp) -> Result<Timestamp, EmissionError> {
        self.catch_up(now)?;
        Ok(self.next_epoch_time)
    }

    /// Tokens issued over `[from, to)` by the rates recorded so far.
    pub fn emitted_between(&self, from: Timestamp, to: Timestamp) -> u128 {
        self.history.issued_between(from, to)
    }

    /// Tokens issued over `[start, end)`, including rollovers not yet written.
    pub fn mintable_in_timeframe(&self, start: Timestamp, end: Timestamp) -> Result<u128, EmissionError> {
        if end <= start {
            return Ok(0);
        }
        self.projected(end)?
            .history
            .issued_between_checked(start, end)
            .ok_or(EmissionError::Overflow)
    }

    /// Everything issued from deployment to `now`, bounded by the cap.
    pub fn available_supply(&self, now: Timestamp) -> Result<u128, EmissionError> {
        self.projected(now)?.issued_to(now)
    }

    /// Account for `amount` newly minted at `now`.
    pub fn record_mint(&mut self, amount: u128, now: Timestamp) -> Result<(), EmissionError> {
        self.catch_up(now)?;
        let available = self.issued_to(now)?;
        let minted = self
            .total_minted
            .checked_add(amount)
            .ok_or(EmissionError::Overflow)?;
        if minted > available {
            return Err(EmissionError::MintExceedsAvailable {
                requested: amount,
                available: available.saturating_sub(self.total_minted),
            });
        }
        self.total_minted = minted;
        Ok(())
    }

    /// A copy with every rollover due by `now` applied.
    pub fn projected(&self, now: Timestamp) -> Result<Self, EmissionError> {
        let mut copy = self.clone();
        copy.catch_up(now)?;
        Ok(copy)
    }

    fn issued_to(&self, now: Timestamp) -> Result<u128, EmissionError> {
        let issued = self
            .history
            .issued_between_checked(self.deployed_at, now)
            .ok_or(EmissionError::Overflow)?;
        Ok(issued.min(self.params.emission_supply_cap))
    }

    fn roll_epoch(&mut self) -> Result<(), EmissionError> {
        let year = u128::from(self.params.rate_reduction_time);
        let (supply, rate, epoch) = match self.mining_epoch {
            None => (self.start_epoch_supply, self.params.initial_rate, 0),
            Some(n) => {
                let issued = self.rate.checked_mul(year).ok_or(EmissionError::Overflow)?;
                let supply = self
                    .start_epoch_supply
                    .checked_add(issued)
                    .ok_or(EmissionError::Overflow)?;
                let rate = mul_div(self.rate, UNIT, self.params.rate_reduction_coefficient)
                    .ok_or(EmissionError::Overflow)?;
                (supply, rate, n + 1)
            }
        };
        let remaining = self.params.emission_supply_cap.saturating_sub(supply);
        let rate = rate.min(remaining.checked_div(year).unwrap_or(0));

        let epoch_start = self.next_epoch_time;
        self.history.apply_rate_change(rate, epoch_start)?;
        self.mining_epoch = Some(epoch);
        self.start_epoch_time = epoch_start;
        self.next_epoch_time = epoch_start.plus(self.params.rate_reduction_time);
        self.start_epoch_supply = supply;
        self.rate = rate;
        self.exhausted = rate == 0;

        info!(
            epoch,
            rate,
            start = %epoch_start,
            start_supply = supply,
            exhausted = self.exhausted,
            "emission epoch started"
        );
        Ok(())
    }
}
