use dataseal_ledger::Ledger;
use dataseal_types::{
    AccountId, Amount, AttestationKey, DataSealError, EventSink, JournaledMap, ProtocolEvent,
    Result, SlashReason, Timestamp, Transactional,
};
use tracing::{info, warn};

use crate::oracle::{OracleAccounts, OracleParams, OracleRecord, SlashOutcome};

/// Oracle Registry: verifier identities, stake and reputation.
/// The only component that rewards, penalizes or slashes oracles.
#[derive(Debug, Clone)]
pub struct OracleRegistry {
    params: OracleParams,
    accounts: OracleAccounts,
    oracles: JournaledMap<AccountId, OracleRecord>,
    registration_order: Vec<AccountId>,
    /// Length of `registration_order` at `begin`
    checkpoint: Option<usize>,
}

impl OracleRegistry {
    pub fn new(params: OracleParams, accounts: OracleAccounts) -> Self {
        OracleRegistry {
            params,
            accounts,
            oracles: JournaledMap::new(),
            registration_order: Vec::new(),
            checkpoint: None,
        }
    }

    pub fn params(&self) -> &OracleParams {
        &self.params
    }

    fn record_mut(&mut self, oracle: &AccountId) -> Result<&mut OracleRecord> {
        self.oracles
            .get_mut(oracle)
            .ok_or_else(|| DataSealError::OracleNotFound(oracle.clone()))
    }

    fn ensure_aggregator(&self, caller: &AccountId, action: &str) -> Result<()> {
        if *caller != self.accounts.aggregator {
            return Err(DataSealError::unauthorized(caller, action));
        }
        Ok(())
    }

    /// Register the caller with `stake` moved into the stake vault
    pub fn register(
        &mut self,
        ledger: &mut impl Ledger,
        caller: &AccountId,
        attestation_key: AttestationKey,
        stake: Amount,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        if self.oracles.contains_key(caller) {
            return Err(DataSealError::OracleAlreadyRegistered(caller.clone()));
        }
        if stake < self.params.min_stake {
            return Err(DataSealError::InsufficientStake {
                required: self.params.min_stake,
                provided: stake,
            });
        }
        ledger.transfer(caller, &self.accounts.stake_vault, stake)?;

        self.oracles.insert(
            caller.clone(),
            OracleRecord {
                id: caller.clone(),
                attestation_key,
                stake,
                reputation: self.params.initial_reputation,
                active: true,
                successful_validations: 0,
                total_validations: 0,
                slash_count: 0,
                registered_at: now,
                last_active_at: now,
            },
        );
        self.registration_order.push(caller.clone());

        info!(oracle = %caller, stake = %stake, "Oracle registered");
        events.emit(ProtocolEvent::OracleRegistered {
            oracle: caller.clone(),
            stake,
        });
        Ok(())
    }

    /// Voluntary exit: the full remaining stake goes back to the oracle.
    /// Callers must first make sure no slash review is open against it.
    pub fn deactivate(
        &mut self,
        ledger: &mut impl Ledger,
        caller: &AccountId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<Amount> {
        let vault = self.accounts.stake_vault.clone();
        let record = self.record_mut(caller)?;
        if !record.active && record.stake.is_zero() {
            return Err(DataSealError::OracleInactive(caller.clone()));
        }

        let returned = record.stake;
        ledger.transfer(&vault, caller, returned)?;
        record.stake = Amount::ZERO;
        record.active = false;
        record.last_active_at = now;

        info!(oracle = %caller, returned = %returned, "Oracle deactivated");
        events.emit(ProtocolEvent::OracleDeactivated {
            oracle: caller.clone(),
            returned_stake: returned,
            forced: false,
        });
        Ok(returned)
    }

    /// Additive top-up. Re-activates an inactive oracle once stake meets the minimum.
    pub fn increase_stake(
        &mut self,
        ledger: &mut impl Ledger,
        caller: &AccountId,
        amount: Amount,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<Amount> {
        if !amount.is_positive() {
            return Err(DataSealError::InvalidAmount(
                "stake increase must be positive".to_string(),
            ));
        }
        let min_stake = self.params.min_stake;
        let vault = self.accounts.stake_vault.clone();
        let record = self.record_mut(caller)?;

        ledger.transfer(caller, &vault, amount)?;
        record.stake = record.stake.checked_add(amount)?;
        record.last_active_at = now;
        let reactivated = !record.active && record.stake >= min_stake;
        if reactivated {
            record.active = true;
        }
        let total_stake = record.stake;

        info!(oracle = %caller, amount = %amount, total = %total_stake, reactivated, "Oracle stake increased");
        events.emit(ProtocolEvent::OracleStakeIncreased {
            oracle: caller.clone(),
            amount,
            total_stake,
            reactivated,
        });
        Ok(total_stake)
    }

    /// Reward or penalize after a consensus round (aggregator only).
    /// Returns the new reputation.
    pub fn update_reputation(
        &mut self,
        caller: &AccountId,
        oracle: &AccountId,
        success: bool,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<u8> {
        self.ensure_aggregator(caller, "update reputation")?;
        let params = self.params.clone();
        let record = self.record_mut(oracle)?;

        if success {
            record.reputation = record
                .reputation
                .saturating_add(params.success_step)
                .min(params.max_reputation);
            record.successful_validations += 1;
        } else {
            record.reputation = record.reputation.saturating_sub(params.failure_step);
        }
        record.total_validations += 1;
        record.last_active_at = now;
        let reputation = record.reputation;

        info!(oracle = %oracle, success, reputation, "Reputation updated");
        events.emit(ProtocolEvent::ReputationUpdated {
            oracle: oracle.clone(),
            success,
            reputation,
        });
        Ok(reputation)
    }

    /// Remove a fixed share of stake to the treasury and apply the reputation
    /// penalty (aggregator only). Force-deactivates when stake drops below minimum.
    #[allow(clippy::too_many_arguments)]
    pub fn slash(
        &mut self,
        ledger: &mut impl Ledger,
        caller: &AccountId,
        oracle: &AccountId,
        reason: SlashReason,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<SlashOutcome> {
        self.ensure_aggregator(caller, "slash oracles")?;
        let params = self.params.clone();
        let vault = self.accounts.stake_vault.clone();
        let treasury = self.accounts.treasury.clone();
        let record = self.record_mut(oracle)?;

        let amount = record.stake.checked_mul_bps(params.slash_bps)?;
        if !amount.is_positive() {
            return Err(DataSealError::NothingToSlash(oracle.clone()));
        }
        ledger.transfer(&vault, &treasury, amount)?;
        record.stake = record.stake.checked_sub(amount)?;
        record.reputation = record
            .reputation
            .saturating_sub(params.slash_reputation_penalty);
        record.slash_count += 1;
        record.last_active_at = now;

        let deactivated = record.active && record.stake < params.min_stake;
        if deactivated {
            record.active = false;
        }

        let outcome = SlashOutcome {
            oracle: oracle.clone(),
            amount,
            remaining_stake: record.stake,
            reputation: record.reputation,
            deactivated,
        };

        warn!(
            oracle = %oracle,
            reason = ?reason,
            amount = %amount,
            remaining = %outcome.remaining_stake,
            deactivated,
            "Oracle slashed"
        );
        events.emit(ProtocolEvent::OracleSlashed {
            oracle: oracle.clone(),
            reason,
            amount,
            remaining_stake: outcome.remaining_stake,
            reputation: outcome.reputation,
        });
        if deactivated {
            events.emit(ProtocolEvent::OracleDeactivated {
                oracle: oracle.clone(),
                returned_stake: Amount::ZERO,
                forced: true,
            });
        }
        Ok(outcome)
    }

    // Queries

    pub fn oracle(&self, oracle: &AccountId) -> Option<&OracleRecord> {
        self.oracles.get(oracle)
    }

    /// Active oracles in registration order
    pub fn active_oracles(&self) -> Vec<&OracleRecord> {
        self.registration_order
            .iter()
            .filter_map(|id| self.oracles.get(id))
            .filter(|record| self.eligible(record))
            .collect()
    }

    fn eligible(&self, record: &OracleRecord) -> bool {
        record.active && record.stake >= self.params.min_stake
    }

    /// Active with stake at or above the minimum
    pub fn is_eligible(&self, oracle: &AccountId) -> bool {
        self.oracles
            .get(oracle)
            .map_or(false, |record| self.eligible(record))
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_oracles().len()
    }
}

impl Transactional for OracleRegistry {
    fn begin(&mut self) {
        self.checkpoint = Some(self.registration_order.len());
        self.oracles.begin();
    }

    fn commit(&mut self) {
        self.checkpoint = None;
        self.oracles.commit();
    }

    fn rollback(&mut self) {
        if let Some(len) = self.checkpoint.take() {
            self.registration_order.truncate(len);
        }
        self.oracles.rollback();
    }
}
