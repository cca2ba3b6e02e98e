use dataseal_consensus::VerificationAggregator;
use dataseal_escrow::{EscrowAccounts, EscrowLedger};
use dataseal_ledger::{Ledger, MemoryLedger};
use dataseal_oracle::{OracleAccounts, OracleRegistry};
use dataseal_tasks::{TaskAuthorities, TaskRegistry};
use dataseal_types::{Amount, MarketId, Result, Transactional};
use serde::{Deserialize, Serialize};

use crate::config::ProtocolConfig;

/// Summary of the protocol for status endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    pub task_count: usize,
    pub oracle_count: usize,
    pub active_oracles: usize,
    pub markets: Vec<MarketId>,
    /// Value held by escrow across all open positions
    pub total_locked: Amount,
    pub total_supply: Amount,
    pub last_event_sequence: u64,
}

/// Every component of the protocol. Each one journals the entries a
/// transaction touches so a rejected transaction can be rolled back as a whole.
#[derive(Debug, Clone)]
pub struct ProtocolState {
    pub ledger: MemoryLedger,
    pub tasks: TaskRegistry,
    pub escrow: EscrowLedger,
    pub oracles: OracleRegistry,
    pub aggregator: VerificationAggregator,
}

impl Transactional for ProtocolState {
    fn begin(&mut self) {
        self.ledger.begin();
        self.tasks.begin();
        self.escrow.begin();
        self.oracles.begin();
        self.aggregator.begin();
    }

    fn commit(&mut self) {
        self.ledger.commit();
        Transactional::commit(&mut self.tasks);
        self.escrow.commit();
        self.oracles.commit();
        self.aggregator.commit();
    }

    fn rollback(&mut self) {
        self.ledger.rollback();
        self.tasks.rollback();
        self.escrow.rollback();
        self.oracles.rollback();
        self.aggregator.rollback();
    }
}

impl ProtocolState {
    pub fn new(config: &ProtocolConfig) -> Self {
        let accounts = &config.accounts;
        Self {
            ledger: MemoryLedger::new(),
            tasks: TaskRegistry::new(
                config.tasks.clone(),
                TaskAuthorities {
                    owner: accounts.owner.clone(),
                    aggregator: accounts.aggregator.clone(),
                    escrow: accounts.escrow.clone(),
                },
                config.markets.iter().copied(),
            ),
            escrow: EscrowLedger::new(
                EscrowAccounts {
                    identity: accounts.escrow.clone(),
                    vault: accounts.escrow_vault.clone(),
                    treasury: accounts.treasury.clone(),
                },
                config.payout.clone(),
            ),
            oracles: OracleRegistry::new(
                config.oracle.clone(),
                OracleAccounts {
                    aggregator: accounts.aggregator.clone(),
                    stake_vault: accounts.oracle_vault.clone(),
                    treasury: accounts.treasury.clone(),
                },
            ),
            aggregator: VerificationAggregator::new(
                config.consensus.clone(),
                accounts.aggregator.clone(),
                accounts.owner.clone(),
            ),
        }
    }

    pub fn status(&self, last_event_sequence: u64) -> Result<ProtocolStatus> {
        Ok(ProtocolStatus {
            task_count: self.tasks.task_count(),
            oracle_count: self.oracles.oracle_count(),
            active_oracles: self.oracles.active_count(),
            markets: self.tasks.markets(),
            total_locked: self.escrow.total_locked()?,
            total_supply: self.ledger.total_supply(),
            last_event_sequence,
        })
    }
}
