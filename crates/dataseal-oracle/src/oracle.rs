use dataseal_types::{AccountId, Amount, AttestationKey, Timestamp, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// Staking and reputation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleParams {
    pub min_stake: Amount,
    /// Neutral midpoint new oracles start at
    pub initial_reputation: u8,
    pub max_reputation: u8,
    pub success_step: u8,
    pub failure_step: u8,
    /// Share of stake removed per slash, in basis points
    pub slash_bps: u32,
    pub slash_reputation_penalty: u8,
}

impl Default for OracleParams {
    fn default() -> Self {
        OracleParams {
            min_stake: Amount::from_units(100),
            initial_reputation: 50,
            max_reputation: 100,
            success_step: 2,
            failure_step: 5,
            slash_bps: BPS_DENOMINATOR / 10,
            slash_reputation_penalty: 20,
        }
    }
}

/// Identities and ledger accounts the registry works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAccounts {
    /// Only caller allowed to update reputation or slash
    pub aggregator: AccountId,
    /// Holds every oracle's stake
    pub stake_vault: AccountId,
    /// Receives slashed stake
    pub treasury: AccountId,
}

/// A registered verifier. Never removed; exit is a status flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRecord {
    pub id: AccountId,
    pub attestation_key: AttestationKey,
    pub stake: Amount,
    pub reputation: u8,
    pub active: bool,
    pub successful_validations: u64,
    pub total_validations: u64,
    pub slash_count: u64,
    pub registered_at: Timestamp,
    pub last_active_at: Timestamp,
}

impl OracleRecord {
    /// Success ratio in basis points; zero before the first round
    pub fn success_rate_bps(&self) -> u32 {
        if self.total_validations == 0 {
            return 0;
        }
        (self.successful_validations * BPS_DENOMINATOR as u64 / self.total_validations) as u32
    }
}

/// Result of a slash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOutcome {
    pub oracle: AccountId,
    pub amount: Amount,
    pub remaining_stake: Amount,
    pub reputation: u8,
    /// True when the slash pushed stake below the minimum and the oracle was deactivated
    pub deactivated: bool,
}
