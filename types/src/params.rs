//! Protocol parameters: every emission, voting and replay constant.
//!
//! These values are observed by the protocol only through behaviour, so they
//! are kept as named, configurable fields rather than literals in the engines.

use crate::amount::UNIT;
use crate::time::{DAY, YEAR};
use serde::{Deserialize, Serialize};

/// All protocol parameters shared by the escrow, registry, emission and fee engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    // ── Escrow ───────────────────────────────────────────────────────────
    /// Longest lock a user may create, in seconds. Default: 4 years.
    pub max_lock_duration: u64,

    // ── Gauge voting ─────────────────────────────────────────────────────
    /// Minimum interval between two votes by the same user for the same gauge.
    /// Default: 10 days.
    pub weight_vote_delay: u64,

    // ── Emission ─────────────────────────────────────────────────────────
    /// Emission rate (raw units per second) of the first rate epoch.
    #[serde(with = "crate::amount::decimal")]
    pub initial_rate: u128,

    /// Per-epoch reduction: `new_rate = rate * UNIT / rate_reduction_coefficient`.
    /// Default: 1.252.
    #[serde(with = "crate::amount::decimal")]
    pub rate_reduction_coefficient: u128,

    /// Length of one rate epoch, in seconds. Default: 365 days.
    pub rate_reduction_time: u64,

    /// Delay between deployment and the first emission epoch. Default: 1 day.
    pub inflation_delay: u64,

    /// Ceiling on the cumulative amount the schedule may ever issue.
    #[serde(with = "crate::amount::decimal")]
    pub emission_supply_cap: u128,

    // ── Fee distribution ─────────────────────────────────────────────────
    /// Minimum spacing between automatic fee-token checkpoints done by `claim`.
    pub token_checkpoint_deadline: u64,

    // ── Replay bounds ────────────────────────────────────────────────────
    /// Week boundaries replayed per global escrow catch-up.
    pub escrow_checkpoint_weeks: u32,

    /// Week boundaries replayed per gauge-weight or reward-integral catch-up.
    pub gauge_checkpoint_weeks: u32,

    /// Weekly supply snapshots taken per fee-distributor checkpoint.
    pub fee_checkpoint_weeks: u32,

    /// Weeks processed per fee claim.
    pub fee_claim_weeks: u32,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            max_lock_duration: 4 * YEAR,
            weight_vote_delay: 10 * DAY,
            initial_rate: 3_191_241_046_289_407_268,
            rate_reduction_coefficient: 1_252_000_000_000_000_000,
            rate_reduction_time: YEAR,
            inflation_delay: DAY,
            emission_supply_cap: 500_000_000 * UNIT,
            token_checkpoint_deadline: DAY,
            escrow_checkpoint_weeks: 255,
            gauge_checkpoint_weeks: 500,
            fee_checkpoint_weeks: 20,
            fee_claim_weeks: 50,
        }
    }
}
