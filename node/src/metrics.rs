//! Prometheus metrics for the protocol node.
//!
//! The [`ProtocolMetrics`] struct owns a dedicated [`Registry`]; a host can
//! encode it into the Prometheus text exposition format with
//! [`ProtocolMetrics::encode`]. Token amounts are reported in whole tokens.

use prometheus::{
    register_counter_with_registry, register_int_counter_with_registry, Counter, Encoder,
    IntCounter, Opts, Registry, TextEncoder,
};
use vegov_types::UNIT;

use crate::NodeError;

/// Node-level counters.
pub struct ProtocolMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Calls ───────────────────────────────────────────────────────────
    /// Calls whose effects were kept.
    pub calls_committed: IntCounter,
    /// Calls that failed and had their effects undone.
    pub calls_rolled_back: IntCounter,

    // ── Token flows ─────────────────────────────────────────────────────
    pub tokens_locked: Counter,
    pub tokens_withdrawn: Counter,
    pub rewards_minted: Counter,
    pub fees_claimed: Counter,
}

impl ProtocolMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let calls_committed = register_int_counter_with_registry!(
            Opts::new("vegov_calls_committed_total", "Calls applied successfully"),
            registry
        )
        .map_err(metrics_error)?;
        let calls_rolled_back = register_int_counter_with_registry!(
            Opts::new(
                "vegov_calls_rolled_back_total",
                "Calls rejected and rolled back"
            ),
            registry
        )
        .map_err(metrics_error)?;

        let tokens_locked = register_counter_with_registry!(
            Opts::new("vegov_tokens_locked_total", "Governance tokens locked in escrow"),
            registry
        )
        .map_err(metrics_error)?;
        let tokens_withdrawn = register_counter_with_registry!(
            Opts::new(
                "vegov_tokens_withdrawn_total",
                "Governance tokens withdrawn from escrow"
            ),
            registry
        )
        .map_err(metrics_error)?;
        let rewards_minted = register_counter_with_registry!(
            Opts::new("vegov_rewards_minted_total", "Emission minted to stakers"),
            registry
        )
        .map_err(metrics_error)?;
        let fees_claimed = register_counter_with_registry!(
            Opts::new("vegov_fees_claimed_total", "Fee tokens paid to lockers"),
            registry
        )
        .map_err(metrics_error)?;

        Ok(Self {
            registry,
            calls_committed,
            calls_rolled_back,
            tokens_locked,
            tokens_withdrawn,
            rewards_minted,
            fees_claimed,
        })
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(metrics_error)?;
        String::from_utf8(buf).map_err(|e| NodeError::Config(e.to_string()))
    }
}

/// Fixed-point amount to whole tokens.
pub(crate) fn whole_tokens(amount: u128) -> f64 {
    amount as f64 / UNIT as f64
}

fn metrics_error(e: prometheus::Error) -> NodeError {
    NodeError::Config(format!("metrics: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        let metrics = ProtocolMetrics::new().unwrap();
        metrics.calls_committed.inc();
        metrics.tokens_locked.inc_by(whole_tokens(15 * UNIT / 10));
        let text = metrics.encode().unwrap();
        assert!(text.contains("vegov_calls_committed_total 1"));
        assert!(text.contains("vegov_tokens_locked_total 1.5"));
    }
}
