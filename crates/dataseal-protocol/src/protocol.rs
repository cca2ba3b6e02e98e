use dataseal_consensus::{Submission, SubmissionOutcome};
use dataseal_escrow::{EscrowPosition, PayoutBreakdown};
use dataseal_events::{EventLog, EventRecord, PendingEvents};
use dataseal_ledger::Ledger;
use dataseal_oracle::{OracleRecord, SlashOutcome};
use dataseal_tasks::SettlementRequest;
use dataseal_types::{
    AccountId, Amount, Attestation, AttestationKey, CommitmentDigest, DataSealError,
    DisputeResolution, EventSink, MarketId, ProtocolEvent, Score, SlashReason, Task, TaskId,
    Timestamp, Transactional,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::state::{ProtocolState, ProtocolStatus};

/// Transaction context: authenticated caller, ledger time and attached value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub sender: AccountId,
    pub now: Timestamp,
    pub value: Amount,
}

impl Tx {
    pub fn new(sender: impl Into<AccountId>, now: Timestamp) -> Self {
        Self {
            sender: sender.into(),
            now,
            value: Amount::ZERO,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Result of a verification submission, including the payout when the
/// submission finalized a task that settles immediately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub outcome: SubmissionOutcome,
    pub payout: Option<PayoutBreakdown>,
}

/// Result of a transition that reaches `Validated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReceipt {
    pub settlement: SettlementRequest,
    pub payout: Option<PayoutBreakdown>,
}

/// Main protocol abstraction: every entry point runs as one atomic transaction
pub struct Protocol {
    state: ProtocolState,
    config: ProtocolConfig,
    log: EventLog,
}

type Step<T> = dataseal_types::Result<T>;

impl Protocol {
    /// Create a protocol instance with the given configuration
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        info!(
            markets = ?config.markets,
            owner = %config.accounts.owner,
            "Protocol initialized"
        );
        Ok(Self {
            state: ProtocolState::new(&config),
            config,
            log: EventLog::new(),
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Run `op` inside a state transaction. On failure every write is rolled
    /// back and no event is published.
    fn execute<T>(
        &mut self,
        action: &'static str,
        tx: &Tx,
        op: impl FnOnce(&mut ProtocolState, &mut PendingEvents) -> Step<T>,
    ) -> Result<T> {
        self.state.begin();
        let mut pending = PendingEvents::new();

        let outcome = op(&mut self.state, &mut pending).and_then(|value| {
            let count = pending.len();
            self.log.append_all(pending.into_inner(), tx.now)?;
            Ok((value, count))
        });

        match outcome {
            Ok((value, events)) => {
                self.state.commit();
                debug!(action, sender = %tx.sender, now = tx.now, events, "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                self.state.rollback();
                warn!(action, sender = %tx.sender, now = tx.now, error = %err, "Transaction rejected");
                Err(err.into())
            }
        }
    }

    /// Pay out a validated task right away when its settlement is already due
    fn release_if_due(
        state: &mut ProtocolState,
        settlement: &SettlementRequest,
        now: Timestamp,
        events: &mut PendingEvents,
    ) -> Step<Option<PayoutBreakdown>> {
        if !settlement.is_immediate(now) {
            return Ok(None);
        }
        state
            .escrow
            .release(&mut state.ledger, &mut state.tasks, settlement.task_id, now, events)
            .map(Some)
    }

    // Funding

    /// Credit a ledger account (development stand-in for native funding)
    pub fn deposit(&mut self, account: &AccountId, amount: Amount, now: Timestamp) -> Result<Amount> {
        let tx = Tx::new(account.clone(), now);
        self.execute("deposit", &tx, |state, events| {
            state.ledger.deposit(account, amount)?;
            events.emit(ProtocolEvent::Deposited {
                account: account.clone(),
                amount,
            });
            Ok(state.ledger.balance(account))
        })
    }

    // Task lifecycle

    pub fn register_market(&mut self, tx: &Tx, market: MarketId) -> Result<()> {
        self.execute("register_market", tx, |state, events| {
            state.tasks.register_market(&tx.sender, market, events)
        })
    }

    /// Commit to an artifact. The attached value is the stake and moves into escrow.
    pub fn commit(
        &mut self,
        tx: &Tx,
        commitment: CommitmentDigest,
        market: MarketId,
        stake: Amount,
    ) -> Result<TaskId> {
        self.execute("commit", tx, |state, events| {
            let task_id =
                state
                    .tasks
                    .commit(&tx.sender, commitment, market, stake, tx.value, tx.now, events)?;
            state
                .escrow
                .lock_stake(&mut state.ledger, &state.tasks, task_id, tx.now, events)?;
            Ok(task_id)
        })
    }

    pub fn reveal(&mut self, tx: &Tx, task_id: TaskId, artifact_pointer: &str) -> Result<Timestamp> {
        self.execute("reveal", tx, |state, events| {
            state
                .tasks
                .reveal(&tx.sender, task_id, artifact_pointer, tx.now, events)
        })
    }

    /// Lock the attached value as the buyer's payment for a task
    pub fn lock_buyer_funds(&mut self, tx: &Tx, task_id: TaskId) -> Result<()> {
        self.execute("lock_buyer_funds", tx, |state, events| {
            state.escrow.lock_buyer_funds(
                &mut state.ledger,
                &state.tasks,
                &tx.sender,
                task_id,
                tx.value,
                tx.value,
                tx.now,
                events,
            )
        })
    }

    /// Release escrow for a validated task whose dispute window has closed
    pub fn settle(&mut self, tx: &Tx, task_id: TaskId) -> Result<PayoutBreakdown> {
        self.execute("settle", tx, |state, events| {
            state
                .escrow
                .release(&mut state.ledger, &mut state.tasks, task_id, tx.now, events)
        })
    }

    pub fn initiate_dispute(&mut self, tx: &Tx, task_id: TaskId) -> Result<()> {
        self.execute("initiate_dispute", tx, |state, events| {
            state
                .tasks
                .initiate_dispute(&tx.sender, task_id, tx.now, events)
        })
    }

    /// Owner ruling on a disputed task. A validating ruling settles at once;
    /// a cancelling ruling refunds at once.
    pub fn resolve_dispute(
        &mut self,
        tx: &Tx,
        task_id: TaskId,
        resolution: DisputeResolution,
    ) -> Result<Option<PayoutBreakdown>> {
        self.execute("resolve_dispute", tx, |state, events| {
            match state
                .tasks
                .resolve_dispute(&tx.sender, task_id, resolution, tx.now, events)?
            {
                Some(settlement) => Self::release_if_due(state, &settlement, tx.now, events),
                None => {
                    state
                        .escrow
                        .refund(&mut state.ledger, &state.tasks, task_id, tx.now, events)?;
                    Ok(None)
                }
            }
        })
    }

    /// Cancel a task whose phase deadline has passed and refund its escrow
    pub fn cancel_expired(&mut self, tx: &Tx, task_id: TaskId) -> Result<()> {
        self.execute("cancel_expired", tx, |state, events| {
            state
                .tasks
                .cancel_expired(&tx.sender, task_id, tx.now, events)?;
            state
                .escrow
                .refund(&mut state.ledger, &state.tasks, task_id, tx.now, events)
        })
    }

    // Oracles

    /// Register the sender as an oracle, staking the attached value
    pub fn register_oracle(&mut self, tx: &Tx, attestation_key: AttestationKey) -> Result<()> {
        self.execute("register_oracle", tx, |state, events| {
            state.oracles.register(
                &mut state.ledger,
                &tx.sender,
                attestation_key,
                tx.value,
                tx.now,
                events,
            )
        })
    }

    /// Add the attached value to the sender's oracle stake
    pub fn increase_oracle_stake(&mut self, tx: &Tx) -> Result<Amount> {
        self.execute("increase_oracle_stake", tx, |state, events| {
            state
                .oracles
                .increase_stake(&mut state.ledger, &tx.sender, tx.value, tx.now, events)
        })
    }

    /// Voluntary exit; returns the stake paid back
    pub fn deactivate_oracle(&mut self, tx: &Tx) -> Result<Amount> {
        self.execute("deactivate_oracle", tx, |state, events| {
            state.aggregator.ensure_no_pending_slash(&tx.sender, tx.now)?;
            state
                .oracles
                .deactivate(&mut state.ledger, &tx.sender, tx.now, events)
        })
    }

    pub fn submit_verification(
        &mut self,
        tx: &Tx,
        task_id: TaskId,
        score: Score,
        attestation: Attestation,
    ) -> Result<SubmissionReceipt> {
        self.execute("submit_verification", tx, |state, events| {
            let outcome = state.aggregator.submit_verification(
                &tx.sender,
                task_id,
                score,
                attestation,
                tx.now,
                &mut state.tasks,
                &mut state.oracles,
                events,
            )?;
            let payout = match &outcome.consensus {
                Some(consensus) => {
                    Self::release_if_due(state, &consensus.settlement, tx.now, events)?
                }
                None => None,
            };
            Ok(SubmissionReceipt { outcome, payout })
        })
    }

    pub fn emergency_finalize(
        &mut self,
        tx: &Tx,
        task_id: TaskId,
        score: Score,
    ) -> Result<ValidationReceipt> {
        self.execute("emergency_finalize", tx, |state, events| {
            let settlement = state.aggregator.emergency_finalize(
                &tx.sender,
                task_id,
                score,
                tx.now,
                &mut state.tasks,
                events,
            )?;
            let payout = Self::release_if_due(state, &settlement, tx.now, events)?;
            Ok(ValidationReceipt { settlement, payout })
        })
    }

    pub fn slash_oracle(
        &mut self,
        tx: &Tx,
        oracle: &AccountId,
        reason: SlashReason,
    ) -> Result<SlashOutcome> {
        self.execute("slash_oracle", tx, |state, events| {
            state.aggregator.slash_outlier(
                &tx.sender,
                oracle,
                reason,
                tx.now,
                &mut state.ledger,
                &mut state.oracles,
                events,
            )
        })
    }

    // Queries

    pub fn task(&self, task_id: TaskId) -> Result<&Task> {
        Ok(self.state.tasks.get_task(task_id)?)
    }

    pub fn tasks_by_provider(&self, provider: &AccountId) -> Vec<&Task> {
        self.state.tasks.tasks_by_provider(provider)
    }

    pub fn tasks_by_market(&self, market: MarketId) -> Vec<&Task> {
        self.state.tasks.tasks_by_market(market)
    }

    /// Seconds left in the task's current phase
    pub fn time_remaining(&self, task_id: TaskId, now: Timestamp) -> Result<Option<u64>> {
        Ok(self.state.tasks.time_remaining(task_id, now)?)
    }

    pub fn oracle(&self, oracle: &AccountId) -> Result<&OracleRecord> {
        self.state
            .oracles
            .oracle(oracle)
            .ok_or_else(|| DataSealError::OracleNotFound(oracle.clone()).into())
    }

    pub fn active_oracles(&self) -> Vec<&OracleRecord> {
        self.state.oracles.active_oracles()
    }

    pub fn submission_count(&self, task_id: TaskId) -> usize {
        self.state.aggregator.submission_count(task_id)
    }

    pub fn submissions(&self, task_id: TaskId) -> &[Submission] {
        self.state.aggregator.submissions(task_id)
    }

    pub fn submission_time_remaining(&self, task_id: TaskId, now: Timestamp) -> Result<Option<u64>> {
        Ok(self
            .state
            .aggregator
            .submission_time_remaining(task_id, now, &self.state.tasks)?)
    }

    pub fn has_consensus(&self, task_id: TaskId) -> bool {
        self.state.aggregator.has_consensus(task_id)
    }

    /// Round closed, by consensus or by the owner
    pub fn is_finalized(&self, task_id: TaskId) -> bool {
        self.state.aggregator.is_finalized(task_id)
    }

    pub fn slash_candidates(&self, task_id: TaskId) -> Vec<AccountId> {
        self.state.aggregator.slash_candidates(task_id)
    }

    pub fn position(&self, task_id: TaskId) -> Result<&EscrowPosition> {
        self.state
            .escrow
            .position(task_id)
            .ok_or_else(|| DataSealError::EscrowNotFound(task_id).into())
    }

    pub fn locked_value(&self, task_id: TaskId) -> Result<Amount> {
        Ok(self.state.escrow.locked_value(task_id)?)
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.state.ledger.balance(account)
    }

    /// Polling interface: records after `cursor`, at most `limit`
    pub fn events_after(&self, cursor: u64, limit: usize) -> &[EventRecord] {
        self.log.events_after(cursor, limit)
    }

    pub fn status(&self) -> Result<ProtocolStatus> {
        Ok(self.state.status(self.log.last_sequence())?)
    }
}
