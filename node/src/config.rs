//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use vegov_types::{Address, ProtocolParams};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a protocol node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Protocol constants. Missing keys fall back to their defaults.
    #[serde(default)]
    pub params: ProtocolParams,

    /// Accounts the components are deployed under.
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter (e.g. "info", "debug,vegov_gauges=trace").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Snapshot file read by `Protocol::open` and written by
    /// `Protocol::persist`, if any.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Component and token accounts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Initial holder of every admin role.
    #[serde(default = "default_admin")]
    pub admin: Address,
    /// Receives the fee distributor's balance on kill or recovery.
    #[serde(default = "default_admin")]
    pub emergency_return: Address,
    #[serde(default = "default_escrow")]
    pub escrow: Address,
    #[serde(default = "default_fee_distributor")]
    pub fee_distributor: Address,
    #[serde(default = "default_governance_token")]
    pub governance_token: Address,
    #[serde(default = "default_fee_token")]
    pub fee_token: Address,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin() -> Address {
    Address::new("admin")
}

fn default_escrow() -> Address {
    Address::new("voting-escrow")
}

fn default_fee_distributor() -> Address {
    Address::new("fee-distributor")
}

fn default_governance_token() -> Address {
    Address::new("governance-token")
}

fn default_fee_token() -> Address {
    Address::new("fee-token")
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    fn validate(&self) -> Result<(), NodeError> {
        let p = &self.params;
        if p.max_lock_duration == 0 || p.rate_reduction_time == 0 {
            return Err(NodeError::Config(
                "max_lock_duration and rate_reduction_time must be positive".into(),
            ));
        }
        if p.rate_reduction_coefficient < vegov_types::UNIT {
            return Err(NodeError::Config(
                "rate_reduction_coefficient below 1.0 would grow the rate".into(),
            ));
        }
        if p.escrow_checkpoint_weeks == 0
            || p.gauge_checkpoint_weeks == 0
            || p.fee_checkpoint_weeks == 0
            || p.fee_claim_weeks == 0
        {
            return Err(NodeError::Config("checkpoint bounds must be positive".into()));
        }
        self.log_format()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            params: ProtocolParams::default(),
            deployment: DeploymentConfig::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            snapshot_path: None,
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            emergency_return: default_admin(),
            escrow: default_escrow(),
            fee_distributor: default_fee_distributor(),
            governance_token: default_governance_token(),
            fee_token: default_fee_token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegov_types::DAY;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.params.initial_rate, config.params.initial_rate);
        assert_eq!(parsed.params.emission_supply_cap, config.params.emission_supply_cap);
        assert_eq!(parsed.deployment.escrow, config.deployment.escrow);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.params.weight_vote_delay, 10 * DAY);
        assert_eq!(config.params.escrow_checkpoint_weeks, 255);
        assert_eq!(config.log_format, "human");
        assert_eq!(config.deployment.admin, Address::new("admin"));
        assert!(config.snapshot_path.is_none());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            log_level = "debug"

            [params]
            weight_vote_delay = 3600
            fee_claim_weeks = 10

            [deployment]
            admin = "dao"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.params.weight_vote_delay, 3600);
        assert_eq!(config.params.fee_claim_weeks, 10);
        assert_eq!(config.params.gauge_checkpoint_weeks, 500); // default
        assert_eq!(config.deployment.admin, Address::new("dao"));
        assert_eq!(config.deployment.emergency_return, Address::new("admin"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let growing = "[params]\nrate_reduction_coefficient = 1\n";
        assert!(matches!(NodeConfig::from_toml_str(growing), Err(NodeError::Config(_))));
        let unbounded = "[params]\nfee_claim_weeks = 0\n";
        assert!(matches!(NodeConfig::from_toml_str(unbounded), Err(NodeError::Config(_))));
        assert!(NodeConfig::from_toml_str("log_format = \"xml\"").is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/vegov.toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
