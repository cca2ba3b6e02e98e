use dataseal_consensus::ConsensusParams;
use dataseal_escrow::PayoutConfig;
use dataseal_oracle::OracleParams;
use dataseal_tasks::TaskParams;
use dataseal_types::{AccountId, MarketId, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{ProtocolError, Result};

/// Configuration for the settlement protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Commit/reveal/validation windows and provider minimum stake
    pub tasks: TaskParams,

    /// Oracle staking, reputation and slashing parameters
    pub oracle: OracleParams,

    /// Median consensus parameters
    pub consensus: ConsensusParams,

    /// How a validated task's pool is split
    pub payout: PayoutConfig,

    /// Owner and module account names
    pub accounts: ModuleAccounts,

    /// Markets valid from genesis
    pub markets: Vec<MarketId>,
}

/// Identities the components use and the ledger accounts they hold value in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAccounts {
    pub owner: AccountId,
    pub aggregator: AccountId,
    pub escrow: AccountId,
    pub escrow_vault: AccountId,
    pub oracle_vault: AccountId,
    pub treasury: AccountId,
}

impl Default for ModuleAccounts {
    fn default() -> Self {
        Self {
            owner: AccountId::new("owner"),
            aggregator: AccountId::new("module/aggregator"),
            escrow: AccountId::new("module/escrow"),
            escrow_vault: AccountId::new("module/escrow_vault"),
            oracle_vault: AccountId::new("module/oracle_vault"),
            treasury: AccountId::new("module/treasury"),
        }
    }
}

impl ModuleAccounts {
    fn all(&self) -> [&AccountId; 6] {
        [
            &self.owner,
            &self.aggregator,
            &self.escrow,
            &self.escrow_vault,
            &self.oracle_vault,
            &self.treasury,
        ]
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            tasks: TaskParams::default(),
            oracle: OracleParams::default(),
            consensus: ConsensusParams::default(),
            payout: PayoutConfig::default(),
            accounts: ModuleAccounts::default(),
            markets: vec![1],
        }
    }
}

impl ProtocolConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ProtocolConfig =
            serde_json::from_str(json).map_err(|e| ProtocolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProtocolError::Config(e.to_string()))
    }

    /// Reject settings the components cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ProtocolError::Config(msg.to_string()));

        if self.tasks.commit_window == 0 || self.tasks.validation_window == 0 {
            return invalid("commit and validation windows must be positive");
        }
        if !self.tasks.min_stake.is_positive() {
            return invalid("task min_stake must be positive");
        }
        if self.tasks.validation_window < self.consensus.submission_window {
            return invalid("validation window is shorter than the submission window");
        }

        self.consensus
            .validate()
            .map_err(|e| ProtocolError::Config(e.to_string()))?;

        if !self.oracle.min_stake.is_positive() {
            return invalid("oracle min_stake must be positive");
        }
        if self.oracle.slash_bps == 0 || self.oracle.slash_bps > BPS_DENOMINATOR {
            return invalid("slash_bps must be in (0, 10000]");
        }
        if self.oracle.initial_reputation > self.oracle.max_reputation {
            return invalid("initial reputation exceeds the maximum");
        }

        let accounts = self.accounts.all();
        if accounts.iter().any(|account| account.is_empty()) {
            return invalid("module account names must not be empty");
        }
        let distinct: BTreeSet<&AccountId> = accounts.iter().copied().collect();
        if distinct.len() != accounts.len() {
            return invalid("module account names must be distinct");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ProtocolConfig::from_json_str(r#"{ "markets": [1, 2, 3], "consensus": { "min_submissions": 3, "tolerance_bps": 1000, "outlier_multiplier": 2, "submission_window": 600, "window_anchor": "first_submission" } }"#)
                .unwrap();
        assert_eq!(config.markets, vec![1, 2, 3]);
        assert_eq!(config.consensus.min_submissions, 3);
        assert_eq!(config.tasks, TaskParams::default());
    }

    #[test]
    fn test_rejects_inconsistent_windows() {
        let mut config = ProtocolConfig::default();
        config.tasks.validation_window = 60;
        assert!(matches!(config.validate(), Err(ProtocolError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_slash_share() {
        let mut config = ProtocolConfig::default();
        config.oracle.slash_bps = 0;
        assert!(config.validate().is_err());
        config.oracle.slash_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_module_accounts() {
        let mut config = ProtocolConfig::default();
        config.accounts.treasury = config.accounts.escrow_vault.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ProtocolConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(ProtocolConfig::from_json_str(&json).unwrap(), config);
    }
}
