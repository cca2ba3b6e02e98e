use dataseal_ledger::Ledger;
use dataseal_tasks::TaskRegistry;
use dataseal_types::{
    AccountId, Amount, DataSealError, EventSink, JournaledMap, ProtocolEvent, Result, TaskId,
    TaskState, Timestamp, Transactional,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::payout::PayoutConfig;

/// Module accounts the escrow works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccounts {
    /// Identity the escrow uses when it asks the task registry to settle
    pub identity: AccountId,
    /// Ledger account holding every locked stake and buyer payment
    pub vault: AccountId,
    /// Receives the forfeited share when no buyer locked funds
    pub treasury: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Released,
    Refunded,
}

/// Value held in trust for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPosition {
    pub task_id: TaskId,
    pub provider: AccountId,
    pub stake: Amount,
    pub buyer: Option<AccountId>,
    pub buyer_amount: Amount,
    pub locked_at: Timestamp,
    pub buyer_locked_at: Option<Timestamp>,
    /// Total value ever paid out of this position
    pub released_total: Amount,
    pub status: PositionStatus,
    pub closed_at: Option<Timestamp>,
}

impl EscrowPosition {
    pub fn is_closed(&self) -> bool {
        self.status != PositionStatus::Open
    }

    /// Stake plus buyer funds
    pub fn pool(&self) -> Result<Amount> {
        self.stake.checked_add(self.buyer_amount)
    }

    /// Value still held; zero once closed
    pub fn locked_value(&self) -> Result<Amount> {
        if self.is_closed() {
            return Ok(Amount::ZERO);
        }
        self.pool()
    }
}

/// How a released pool was split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    pub task_id: TaskId,
    pub provider_amount: Amount,
    pub buyer_amount: Amount,
    pub treasury_amount: Amount,
}

/// Escrow Ledger: the only component that moves task value.
/// It acts only on states the task registry has already reached.
#[derive(Debug, Clone)]
pub struct EscrowLedger {
    accounts: EscrowAccounts,
    payout: PayoutConfig,
    positions: JournaledMap<TaskId, EscrowPosition>,
}

impl EscrowLedger {
    pub fn new(accounts: EscrowAccounts, payout: PayoutConfig) -> Self {
        EscrowLedger {
            accounts,
            payout,
            positions: JournaledMap::new(),
        }
    }

    pub fn accounts(&self) -> &EscrowAccounts {
        &self.accounts
    }

    pub fn payout_config(&self) -> &PayoutConfig {
        &self.payout
    }

    fn open_position_mut(&mut self, task_id: TaskId) -> Result<&mut EscrowPosition> {
        let position = self
            .positions
            .get_mut(&task_id)
            .ok_or(DataSealError::EscrowNotFound(task_id))?;
        if position.is_closed() {
            return Err(DataSealError::EscrowClosed(task_id));
        }
        Ok(position)
    }

    /// Move the provider's stake into the vault for a freshly committed task
    pub fn lock_stake(
        &mut self,
        ledger: &mut impl Ledger,
        registry: &TaskRegistry,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let task = registry.get_task(task_id)?;
        task.ensure_state(TaskState::Committed)?;
        if self.positions.contains_key(&task_id) {
            return Err(DataSealError::AlreadyLocked(task_id));
        }

        ledger.transfer(&task.provider, &self.accounts.vault, task.stake)?;
        self.positions.insert(
            task_id,
            EscrowPosition {
                task_id,
                provider: task.provider.clone(),
                stake: task.stake,
                buyer: None,
                buyer_amount: Amount::ZERO,
                locked_at: now,
                buyer_locked_at: None,
                released_total: Amount::ZERO,
                status: PositionStatus::Open,
                closed_at: None,
            },
        );

        info!(task_id, provider = %task.provider, amount = %task.stake, "Stake locked");
        events.emit(ProtocolEvent::StakeLocked {
            task_id,
            provider: task.provider.clone(),
            amount: task.stake,
        });
        Ok(())
    }

    /// Lock a buyer's payment against a `Committed` task. One buyer per task.
    #[allow(clippy::too_many_arguments)]
    pub fn lock_buyer_funds(
        &mut self,
        ledger: &mut impl Ledger,
        registry: &TaskRegistry,
        buyer: &AccountId,
        task_id: TaskId,
        amount: Amount,
        attached: Amount,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        if amount != attached {
            return Err(DataSealError::ValueMismatch {
                declared: amount,
                attached,
            });
        }
        if !amount.is_positive() {
            return Err(DataSealError::InvalidAmount(
                "buyer amount must be positive".to_string(),
            ));
        }
        let task = registry.get_task(task_id)?;
        task.ensure_state(TaskState::Committed)?;
        if !task.within_reveal_window(now) {
            return Err(DataSealError::DeadlineExceeded {
                task_id,
                deadline: task.reveal_deadline,
                now,
            });
        }

        let vault = self.accounts.vault.clone();
        let position = self.open_position_mut(task_id)?;
        if position.buyer.is_some() {
            return Err(DataSealError::AlreadyLocked(task_id));
        }

        ledger.transfer(buyer, &vault, amount)?;
        position.buyer = Some(buyer.clone());
        position.buyer_amount = amount;
        position.buyer_locked_at = Some(now);

        info!(task_id, buyer = %buyer, amount = %amount, "Buyer funds locked");
        events.emit(ProtocolEvent::BuyerFundsLocked {
            task_id,
            buyer: buyer.clone(),
            amount,
        });
        Ok(())
    }

    /// Pay out a validated task according to its score, then settle it
    pub fn release(
        &mut self,
        ledger: &mut impl Ledger,
        registry: &mut TaskRegistry,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<PayoutBreakdown> {
        let task = registry.ensure_settleable(task_id, now)?;
        let score = task.score.ok_or_else(|| {
            DataSealError::Internal(format!("validated task {} has no score", task_id))
        })?;

        let share_bps = self.payout.policy().provider_share_bps(score);
        let accounts = self.accounts.clone();
        let position = self.open_position_mut(task_id)?;
        let pool = position.pool()?;
        let provider_amount = pool.checked_mul_bps(share_bps)?;
        let remainder = pool.checked_sub(provider_amount)?;
        let (buyer_amount, treasury_amount) = match position.buyer {
            Some(_) => (remainder, Amount::ZERO),
            None => (Amount::ZERO, remainder),
        };

        ledger.transfer(&accounts.vault, &position.provider, provider_amount)?;
        if let Some(buyer) = &position.buyer {
            ledger.transfer(&accounts.vault, buyer, buyer_amount)?;
        }
        ledger.transfer(&accounts.vault, &accounts.treasury, treasury_amount)?;

        position.released_total = position.released_total.checked_add(pool)?;
        position.status = PositionStatus::Released;
        position.closed_at = Some(now);

        info!(
            task_id,
            score = %score,
            provider_amount = %provider_amount,
            buyer_amount = %buyer_amount,
            treasury_amount = %treasury_amount,
            "Escrow released"
        );
        events.emit(ProtocolEvent::EscrowReleased {
            task_id,
            provider: position.provider.clone(),
            provider_amount,
            buyer: position.buyer.clone(),
            buyer_amount,
            treasury_amount,
        });

        registry.settle(&accounts.identity, task_id, now, events)?;

        Ok(PayoutBreakdown {
            task_id,
            provider_amount,
            buyer_amount,
            treasury_amount,
        })
    }

    /// Return stake and buyer funds for a cancelled task
    pub fn refund(
        &mut self,
        ledger: &mut impl Ledger,
        registry: &TaskRegistry,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        registry
            .get_task(task_id)?
            .ensure_state(TaskState::Cancelled)?;

        let vault = self.accounts.vault.clone();
        let position = self.open_position_mut(task_id)?;
        ledger.transfer(&vault, &position.provider, position.stake)?;
        if let Some(buyer) = &position.buyer {
            ledger.transfer(&vault, buyer, position.buyer_amount)?;
        }

        let refunded = position.pool()?;
        position.released_total = position.released_total.checked_add(refunded)?;
        position.status = PositionStatus::Refunded;
        position.closed_at = Some(now);

        if position.buyer.is_none() {
            warn!(task_id, "Refunding task that never attracted a buyer");
        }
        info!(task_id, stake = %position.stake, buyer_amount = %position.buyer_amount, "Escrow refunded");
        events.emit(ProtocolEvent::EscrowRefunded {
            task_id,
            provider: position.provider.clone(),
            stake: position.stake,
            buyer: position.buyer.clone(),
            buyer_amount: position.buyer_amount,
        });
        Ok(())
    }

    // Queries

    pub fn position(&self, task_id: TaskId) -> Option<&EscrowPosition> {
        self.positions.get(&task_id)
    }

    pub fn locked_value(&self, task_id: TaskId) -> Result<Amount> {
        self.positions
            .get(&task_id)
            .map_or(Ok(Amount::ZERO), EscrowPosition::locked_value)
    }

    /// Sum of value still held across all open positions
    pub fn total_locked(&self) -> Result<Amount> {
        self.positions
            .values()
            .try_fold(Amount::ZERO, |acc, position| {
                acc.checked_add(position.locked_value()?)
            })
    }

    pub fn positions(&self) -> impl Iterator<Item = &EscrowPosition> {
        self.positions.values()
    }
}

impl Transactional for EscrowLedger {
    fn begin(&mut self) {
        self.positions.begin();
    }

    fn commit(&mut self) {
        self.positions.commit();
    }

    fn rollback(&mut self) {
        self.positions.rollback();
    }
}
