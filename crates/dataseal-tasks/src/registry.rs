use dataseal_types::{
    AccountId, Amount, Attestation, CommitmentDigest, DataSealError, DisputeResolution, EventSink,
    JournaledMap, MarketId, ProtocolEvent, Result, Score, Task, TaskId, TaskState, Timestamp,
    Transactional,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::validation::{validate_artifact_pointer, validate_commitment, validate_stake};

/// Windows and minimum stake governing every task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Seconds between commit and the reveal deadline
    pub commit_window: u64,
    /// Seconds between reveal and the validation deadline
    pub validation_window: u64,
    /// Seconds after reveal/validation during which a dispute may be raised.
    /// Zero disables disputes and lets settlement happen immediately.
    pub dispute_grace_window: u64,
    /// Minimum provider stake per task
    pub min_stake: Amount,
}

impl Default for TaskParams {
    fn default() -> Self {
        TaskParams {
            commit_window: 86_400,
            validation_window: 3_600,
            dispute_grace_window: 3_600,
            min_stake: Amount::from_units(10),
        }
    }
}

/// Identities allowed to drive privileged transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAuthorities {
    pub owner: AccountId,
    pub aggregator: AccountId,
    pub escrow: AccountId,
}

/// Signal returned when a task reaches `Validated`.
/// The registry never moves value itself; whoever holds this asks escrow to pay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub task_id: TaskId,
    pub score: Score,
    /// Earliest time at which settlement is accepted
    pub settle_after: Timestamp,
}

impl SettlementRequest {
    pub fn is_immediate(&self, now: Timestamp) -> bool {
        now >= self.settle_after
    }
}

/// Task Registry: single source of truth for task state.
/// Records are never removed; insertion-ordered index lists serve the list queries.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    params: TaskParams,
    authorities: TaskAuthorities,
    tasks: JournaledMap<TaskId, Task>,
    next_id: TaskId,
    by_provider: JournaledMap<AccountId, Vec<TaskId>>,
    by_market: JournaledMap<MarketId, Vec<TaskId>>,
    markets: BTreeSet<MarketId>,
    /// Id counter and market set at `begin`
    checkpoint: Option<(TaskId, BTreeSet<MarketId>)>,
}

impl TaskRegistry {
    pub fn new(
        params: TaskParams,
        authorities: TaskAuthorities,
        markets: impl IntoIterator<Item = MarketId>,
    ) -> Self {
        TaskRegistry {
            params,
            authorities,
            tasks: JournaledMap::new(),
            next_id: 1,
            by_provider: JournaledMap::new(),
            by_market: JournaledMap::new(),
            markets: markets.into_iter().collect(),
            checkpoint: None,
        }
    }

    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    pub fn authorities(&self) -> &TaskAuthorities {
        &self.authorities
    }

    fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(&task_id)
            .ok_or(DataSealError::TaskNotFound(task_id))
    }

    fn ensure_owner(&self, caller: &AccountId, action: &str) -> Result<()> {
        if *caller != self.authorities.owner {
            return Err(DataSealError::unauthorized(caller, action));
        }
        Ok(())
    }

    /// Add a market to the valid set (owner only)
    pub fn register_market(
        &mut self,
        caller: &AccountId,
        market: MarketId,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.ensure_owner(caller, "register markets")?;
        if !self.markets.insert(market) {
            return Err(DataSealError::MarketExists(market));
        }
        info!(market, "Market registered");
        events.emit(ProtocolEvent::MarketRegistered { market });
        Ok(())
    }

    /// Create a `Committed` task. `attached` is the value the caller transferred
    /// with the transaction and must equal `stake`.
    #[allow(clippy::too_many_arguments)]
    pub fn commit(
        &mut self,
        provider: &AccountId,
        commitment: CommitmentDigest,
        market: MarketId,
        stake: Amount,
        attached: Amount,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<TaskId> {
        validate_commitment(&commitment)?;
        if !self.markets.contains(&market) {
            return Err(DataSealError::InvalidMarket(market));
        }
        validate_stake(stake, attached, self.params.min_stake)?;

        let task_id = self.next_id;
        self.next_id += 1;

        let task = Task::committed(
            task_id,
            commitment,
            provider.clone(),
            market,
            stake,
            now,
            self.params.commit_window,
        );
        let reveal_deadline = task.reveal_deadline;
        self.tasks.insert(task_id, task);
        self.by_provider
            .get_or_insert_with(provider.clone(), Vec::new)
            .push(task_id);
        self.by_market
            .get_or_insert_with(market, Vec::new)
            .push(task_id);

        info!(
            task_id,
            provider = %provider,
            market,
            stake = %stake,
            reveal_deadline,
            "Task committed"
        );
        events.emit(ProtocolEvent::TaskCommitted {
            task_id,
            provider: provider.clone(),
            market,
            stake,
            commitment,
            reveal_deadline,
        });
        Ok(task_id)
    }

    /// Publish the artifact pointer. Returns the validation deadline.
    pub fn reveal(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        artifact_pointer: &str,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<Timestamp> {
        let validation_window = self.params.validation_window;
        let task = self.task_mut(task_id)?;
        if task.provider != *caller {
            return Err(DataSealError::NotProvider {
                task_id,
                caller: caller.clone(),
            });
        }
        task.ensure_state(TaskState::Committed)?;
        if !task.within_reveal_window(now) {
            return Err(DataSealError::DeadlineExceeded {
                task_id,
                deadline: task.reveal_deadline,
                now,
            });
        }
        validate_artifact_pointer(artifact_pointer)?;

        task.transition(TaskState::Revealed)?;
        let validation_deadline = now.saturating_add(validation_window);
        task.artifact_pointer = Some(artifact_pointer.to_string());
        task.validation_deadline = Some(validation_deadline);
        task.revealed_at = Some(now);

        info!(task_id, validation_deadline, "Task revealed");
        events.emit(ProtocolEvent::TaskRevealed {
            task_id,
            artifact_pointer: artifact_pointer.to_string(),
            validation_deadline,
        });
        Ok(validation_deadline)
    }

    /// Record the consensus outcome (aggregator only, before the validation deadline)
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_validation(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        score: Score,
        verifier: &AccountId,
        attestation: Attestation,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<SettlementRequest> {
        if *caller != self.authorities.aggregator {
            return Err(DataSealError::unauthorized(caller, "finalize validation"));
        }
        let task = self.get_task(task_id)?;
        if task.is_terminal() {
            return Err(DataSealError::TaskFinalized(task_id));
        }
        task.ensure_state(TaskState::Revealed)?;
        if !task.within_validation_window(now) {
            return Err(DataSealError::DeadlineExceeded {
                task_id,
                deadline: task.validation_deadline.unwrap_or(task.reveal_deadline),
                now,
            });
        }
        self.apply_validation(task_id, score, verifier, Some(attestation), now, false, events)
    }

    /// Owner escape hatch for rounds that never reached consensus.
    /// Skips the validation deadline but still requires `Revealed`.
    pub fn emergency_validation(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        score: Score,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<SettlementRequest> {
        self.ensure_owner(caller, "emergency finalize")?;
        let task = self.get_task(task_id)?;
        if task.is_terminal() {
            return Err(DataSealError::TaskFinalized(task_id));
        }
        task.ensure_state(TaskState::Revealed)?;
        let owner = self.authorities.owner.clone();
        self.apply_validation(task_id, score, &owner, None, now, true, events)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_validation(
        &mut self,
        task_id: TaskId,
        score: Score,
        verifier: &AccountId,
        attestation: Option<Attestation>,
        now: Timestamp,
        emergency: bool,
        events: &mut impl EventSink,
    ) -> Result<SettlementRequest> {
        let grace = self.params.dispute_grace_window;
        let task = self.task_mut(task_id)?;
        task.transition(TaskState::Validated)?;
        task.score = Some(score);
        task.verifier = Some(verifier.clone());
        task.attestation = attestation;
        task.validated_at = Some(now);

        info!(task_id, score = %score, verifier = %verifier, emergency, "Task validated");
        events.emit(ProtocolEvent::TaskValidated {
            task_id,
            score,
            verifier: verifier.clone(),
            emergency,
        });
        Ok(SettlementRequest {
            task_id,
            score,
            settle_after: Self::settle_after(task, grace),
        })
    }

    /// Earliest settlement time for a validated task. A task that already went
    /// through a dispute settles as soon as the owner rules.
    fn settle_after(task: &Task, grace: u64) -> Timestamp {
        let validated_at = task.validated_at.unwrap_or(task.created_at);
        if task.disputed_at.is_some() || grace == 0 {
            validated_at
        } else {
            validated_at.saturating_add(grace).saturating_add(1)
        }
    }

    /// Check that a task may be settled now, without changing anything
    pub fn ensure_settleable(&self, task_id: TaskId, now: Timestamp) -> Result<&Task> {
        let task = self.get_task(task_id)?;
        task.ensure_state(TaskState::Validated)?;
        let until = Self::settle_after(task, self.params.dispute_grace_window);
        if now < until {
            return Err(DataSealError::SettlementLocked {
                task_id,
                until: until.saturating_sub(1),
            });
        }
        Ok(task)
    }

    /// `Validated -> Settled` (escrow only, after it has paid out)
    pub fn settle(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        if *caller != self.authorities.escrow {
            return Err(DataSealError::unauthorized(caller, "settle tasks"));
        }
        self.ensure_settleable(task_id, now)?;
        let task = self.task_mut(task_id)?;
        task.transition(TaskState::Settled)?;
        task.closed_at = Some(now);

        info!(task_id, "Task settled");
        events.emit(ProtocolEvent::TaskSettled { task_id });
        Ok(())
    }

    /// Freeze a `Revealed` or `Validated` task pending owner resolution.
    /// A task can be disputed once.
    pub fn initiate_dispute(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let grace = self.params.dispute_grace_window;
        let task = self.task_mut(task_id)?;
        let from = task.state;
        if !from.can_transition_to(TaskState::Disputed) {
            return Err(DataSealError::IllegalTransition {
                task_id,
                from,
                to: TaskState::Disputed,
            });
        }
        if task.disputed_at.is_some() || !task.dispute_window_open(now, grace) {
            return Err(DataSealError::DisputeWindowClosed(task_id));
        }

        task.transition(TaskState::Disputed)?;
        task.disputed_at = Some(now);
        task.disputed_by = Some(caller.clone());
        task.disputed_from = Some(from);

        info!(task_id, raised_by = %caller, from = %from, "Task disputed");
        events.emit(ProtocolEvent::TaskDisputed {
            task_id,
            raised_by: caller.clone(),
            from,
        });
        Ok(())
    }

    /// Owner ruling on a disputed task. Returns a settlement request when the
    /// ruling validates the task; `None` means the task was cancelled.
    pub fn resolve_dispute(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        resolution: DisputeResolution,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<Option<SettlementRequest>> {
        self.ensure_owner(caller, "resolve disputes")?;
        self.get_task(task_id)?.ensure_state(TaskState::Disputed)?;

        info!(task_id, resolution = ?resolution, "Dispute resolved");
        events.emit(ProtocolEvent::DisputeResolved {
            task_id,
            resolution,
        });

        match resolution {
            DisputeResolution::Validate { score } => {
                let verifier = self
                    .get_task(task_id)?
                    .verifier
                    .clone()
                    .unwrap_or_else(|| self.authorities.owner.clone());
                let attestation = self.get_task(task_id)?.attestation.clone();
                self.apply_validation(task_id, score, &verifier, attestation, now, false, events)
                    .map(Some)
            }
            DisputeResolution::Cancel => {
                self.apply_cancel(task_id, now, events)?;
                Ok(None)
            }
        }
    }

    /// Clean up a task that missed its phase deadline. Callable by anyone.
    pub fn cancel_expired(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let task = self.get_task(task_id)?;
        if task.is_terminal() {
            return Err(DataSealError::TaskFinalized(task_id));
        }
        let deadline = match task.state {
            TaskState::Committed => task.reveal_deadline,
            TaskState::Revealed => task.validation_deadline.unwrap_or(task.reveal_deadline),
            actual => {
                return Err(DataSealError::WrongState {
                    task_id,
                    expected: TaskState::Revealed,
                    actual,
                })
            }
        };
        if now <= deadline {
            return Err(DataSealError::DeadlineNotReached {
                task_id,
                deadline,
                now,
            });
        }
        debug!(task_id, caller = %caller, deadline, now, "Cancelling expired task");
        self.apply_cancel(task_id, now, events)
    }

    fn apply_cancel(
        &mut self,
        task_id: TaskId,
        now: Timestamp,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let task = self.task_mut(task_id)?;
        let from = task.state;
        task.transition(TaskState::Cancelled)?;
        task.closed_at = Some(now);

        info!(task_id, from = %from, "Task cancelled");
        events.emit(ProtocolEvent::TaskCancelled { task_id, from });
        Ok(())
    }

    // Queries

    pub fn get_task(&self, task_id: TaskId) -> Result<&Task> {
        self.tasks
            .get(&task_id)
            .ok_or(DataSealError::TaskNotFound(task_id))
    }

    pub fn can_reveal(&self, task_id: TaskId, now: Timestamp) -> bool {
        self.tasks.get(&task_id).map_or(false, |task| {
            task.state == TaskState::Committed && task.within_reveal_window(now)
        })
    }

    pub fn can_validate(&self, task_id: TaskId, now: Timestamp) -> bool {
        self.tasks.get(&task_id).map_or(false, |task| {
            task.state == TaskState::Revealed && task.within_validation_window(now)
        })
    }

    /// Tasks of a provider in commit order
    pub fn tasks_by_provider(&self, provider: &AccountId) -> Vec<&Task> {
        self.collect(self.by_provider.get(provider))
    }

    /// Tasks of a market in commit order
    pub fn tasks_by_market(&self, market: MarketId) -> Vec<&Task> {
        self.collect(self.by_market.get(&market))
    }

    fn collect(&self, ids: Option<&Vec<TaskId>>) -> Vec<&Task> {
        ids.map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Seconds left in the current phase. `None` when the phase has no deadline.
    pub fn time_remaining(&self, task_id: TaskId, now: Timestamp) -> Result<Option<u64>> {
        Ok(self
            .get_task(task_id)?
            .phase_deadline()
            .map(|deadline| deadline.saturating_sub(now)))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_valid_market(&self, market: MarketId) -> bool {
        self.markets.contains(&market)
    }

    pub fn markets(&self) -> Vec<MarketId> {
        self.markets.iter().copied().collect()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }
}

impl Transactional for TaskRegistry {
    fn begin(&mut self) {
        self.checkpoint = Some((self.next_id, self.markets.clone()));
        self.tasks.begin();
        self.by_provider.begin();
        self.by_market.begin();
    }

    fn commit(&mut self) {
        self.checkpoint = None;
        self.tasks.commit();
        self.by_provider.commit();
        self.by_market.commit();
    }

    fn rollback(&mut self) {
        if let Some((next_id, markets)) = self.checkpoint.take() {
            self.next_id = next_id;
            self.markets = markets;
        }
        self.tasks.rollback();
        self.by_provider.rollback();
        self.by_market.rollback();
    }
}
