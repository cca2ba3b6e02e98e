use dataseal_ledger::Ledger;
use dataseal_oracle::{OracleRegistry, SlashOutcome};
use dataseal_tasks::{SettlementRequest, TaskRegistry};
use dataseal_types::{
    AccountId, Attestation, DataSealError, EventSink, JournaledMap, ProtocolEvent, Result, Score,
    SlashReason, TaskId, TaskState, Timestamp, Transactional, BPS_DENOMINATOR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::attestation::verify_attestation;
use crate::round::{ConsensusRound, RoundOutcome, Submission};

/// Point the submission window is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    Reveal,
    FirstSubmission,
}

/// Consensus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Minimum submissions overall, and minimum inside the band
    pub min_submissions: usize,
    /// Band half-width as a share of the median, in basis points
    pub tolerance_bps: u32,
    /// Multiple of the band beyond which an oracle is flagged for slashing
    pub outlier_multiplier: u32,
    /// Seconds during which submissions are accepted
    pub submission_window: u64,
    pub window_anchor: WindowAnchor,
    /// Seconds after finalization during which flagged outliers may be
    /// slashed. Their stake cannot be withdrawn until it elapses.
    #[serde(default = "default_slash_review_window")]
    pub slash_review_window: u64,
}

fn default_slash_review_window() -> u64 {
    86_400
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            min_submissions: 2,
            tolerance_bps: 1_500,
            outlier_multiplier: 3,
            submission_window: 300,
            window_anchor: WindowAnchor::Reveal,
            slash_review_window: default_slash_review_window(),
        }
    }
}

impl ConsensusParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_submissions == 0 {
            return Err(DataSealError::ConfigError(
                "min_submissions must be at least 1".to_string(),
            ));
        }
        if self.tolerance_bps >= BPS_DENOMINATOR {
            return Err(DataSealError::ConfigError(
                "tolerance must be below 100%".to_string(),
            ));
        }
        if self.outlier_multiplier == 0 {
            return Err(DataSealError::ConfigError(
                "outlier_multiplier must be at least 1".to_string(),
            ));
        }
        if self.submission_window == 0 {
            return Err(DataSealError::ConfigError(
                "submission_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Consensus reached on a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub round: RoundOutcome,
    pub settlement: SettlementRequest,
}

/// Result of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub task_id: TaskId,
    pub submission_count: usize,
    pub consensus: Option<ConsensusOutcome>,
}

/// Verification Aggregator: collects oracle scores, detects consensus and
/// reports outcomes to the task and oracle registries.
#[derive(Debug, Clone)]
pub struct VerificationAggregator {
    params: ConsensusParams,
    /// Identity the aggregator uses toward the registries
    identity: AccountId,
    owner: AccountId,
    rounds: JournaledMap<TaskId, ConsensusRound>,
    /// Open slash reviews per oracle: task and review close time
    pending_slashes: JournaledMap<AccountId, BTreeMap<TaskId, Timestamp>>,
}

impl VerificationAggregator {
    pub fn new(params: ConsensusParams, identity: AccountId, owner: AccountId) -> Self {
        VerificationAggregator {
            params,
            identity,
            owner,
            rounds: JournaledMap::new(),
            pending_slashes: JournaledMap::new(),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn identity(&self) -> &AccountId {
        &self.identity
    }

    fn ensure_owner(&self, caller: &AccountId, action: &str) -> Result<()> {
        if *caller != self.owner {
            return Err(DataSealError::unauthorized(caller, action));
        }
        Ok(())
    }

    fn ensure_not_finalized(&self, task_id: TaskId) -> Result<()> {
        if self.is_finalized(task_id) {
            return Err(DataSealError::TaskFinalized(task_id));
        }
        Ok(())
    }

    /// Close time of the submission window; `None` before it has started
    fn window_closes_at(&self, task_id: TaskId, revealed_at: Option<Timestamp>) -> Option<Timestamp> {
        let anchor = match self.params.window_anchor {
            WindowAnchor::Reveal => revealed_at,
            WindowAnchor::FirstSubmission => self
                .rounds
                .get(&task_id)
                .and_then(ConsensusRound::first_submission_at),
        };
        anchor.map(|at| at.saturating_add(self.params.submission_window))
    }

    /// Accept one oracle's score for a revealed task and finalize the task
    /// if the round reaches consensus.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_verification(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        score: Score,
        attestation: Attestation,
        now: Timestamp,
        tasks: &mut TaskRegistry,
        oracles: &mut OracleRegistry,
        events: &mut impl EventSink,
    ) -> Result<SubmissionOutcome> {
        let record = oracles
            .oracle(caller)
            .ok_or_else(|| DataSealError::OracleNotFound(caller.clone()))?;
        if !oracles.is_eligible(caller) {
            return Err(DataSealError::OracleInactive(caller.clone()));
        }
        let key = record.attestation_key;

        let task = tasks.get_task(task_id)?;
        if task.is_terminal() {
            return Err(DataSealError::TaskFinalized(task_id));
        }
        self.ensure_not_finalized(task_id)?;
        task.ensure_state(TaskState::Revealed)?;
        if !task.within_validation_window(now) {
            return Err(DataSealError::DeadlineExceeded {
                task_id,
                deadline: task.validation_deadline.unwrap_or(task.reveal_deadline),
                now,
            });
        }
        if let Some(closed_at) = self.window_closes_at(task_id, task.revealed_at) {
            if now > closed_at {
                return Err(DataSealError::SubmissionWindowClosed {
                    task_id,
                    closed_at,
                    now,
                });
            }
        }

        let round = self
            .rounds
            .get_or_insert_with(task_id, || ConsensusRound::new(task_id));
        if round.has_submitted(caller) {
            return Err(DataSealError::AlreadySubmitted {
                task_id,
                oracle: caller.clone(),
            });
        }
        verify_attestation(&key, task_id, score, caller, &attestation)?;

        round.submissions.push(Submission {
            oracle: caller.clone(),
            score,
            attestation,
            submitted_at: now,
        });
        let submission_count = round.submissions.len();

        debug!(task_id, oracle = %caller, score = %score, submission_count, "Verification submitted");
        events.emit(ProtocolEvent::VerificationSubmitted {
            task_id,
            oracle: caller.clone(),
            score,
            submission_count,
        });

        // Oracles that exited or were slashed below the minimum since
        // submitting no longer count.
        let evaluated = round.evaluate_counted(
            |oracle| oracles.is_eligible(oracle),
            self.params.min_submissions,
            self.params.tolerance_bps,
            self.params.outlier_multiplier,
        );
        let consensus = match evaluated {
            Some(outcome) => Some(self.finalize_round(task_id, outcome, now, tasks, oracles, events)?),
            None => None,
        };

        Ok(SubmissionOutcome {
            task_id,
            submission_count,
            consensus,
        })
    }

    fn finalize_round(
        &mut self,
        task_id: TaskId,
        outcome: RoundOutcome,
        now: Timestamp,
        tasks: &mut TaskRegistry,
        oracles: &mut OracleRegistry,
        events: &mut impl EventSink,
    ) -> Result<ConsensusOutcome> {
        let round = self
            .rounds
            .get_mut(&task_id)
            .ok_or(DataSealError::RoundNotFinalized(task_id))?;
        round.finalized = true;
        round.finalized_at = Some(now);
        round.final_score = Some(outcome.final_score);
        round.slash_candidates = outcome.slash_candidates.clone();
        let review_closes_at = now.saturating_add(self.params.slash_review_window);
        for oracle in &outcome.slash_candidates {
            self.pending_slashes
                .get_or_insert_with(oracle.clone(), BTreeMap::new)
                .insert(task_id, review_closes_at);
        }
        let submissions = round.submissions.clone();

        info!(
            task_id,
            final_score = %outcome.final_score,
            submissions = submissions.len(),
            in_band = outcome.in_band.len(),
            "Consensus reached"
        );
        events.emit(ProtocolEvent::ConsensusReached {
            task_id,
            final_score: outcome.final_score,
            submission_count: submissions.len(),
            in_band: outcome.in_band.len(),
        });

        let settlement = tasks.finalize_validation(
            &self.identity,
            task_id,
            outcome.final_score,
            &outcome.verifier,
            outcome.receipt.clone(),
            now,
            events,
        )?;

        for oracle in &outcome.in_band {
            oracles.update_reputation(&self.identity, oracle, true, now, events)?;
        }
        for oracle in &outcome.out_of_band {
            oracles.update_reputation(&self.identity, oracle, false, now, events)?;
        }

        for submission in submissions
            .iter()
            .filter(|s| outcome.slash_candidates.contains(&s.oracle))
        {
            warn!(task_id, oracle = %submission.oracle, score = %submission.score, "Slash candidate flagged");
            events.emit(ProtocolEvent::SlashCandidateFlagged {
                task_id,
                oracle: submission.oracle.clone(),
                score: submission.score,
            });
        }

        Ok(ConsensusOutcome {
            round: outcome,
            settlement,
        })
    }

    /// Owner escape hatch for a round that cannot reach consensus.
    /// Bypasses consensus and the validation deadline; reputation is untouched.
    pub fn emergency_finalize(
        &mut self,
        caller: &AccountId,
        task_id: TaskId,
        score: Score,
        now: Timestamp,
        tasks: &mut TaskRegistry,
        events: &mut impl EventSink,
    ) -> Result<SettlementRequest> {
        self.ensure_owner(caller, "emergency finalize")?;
        self.ensure_not_finalized(task_id)?;

        let settlement = tasks.emergency_validation(caller, task_id, score, now, events)?;

        let round = self
            .rounds
            .get_or_insert_with(task_id, || ConsensusRound::new(task_id));
        round.finalized = true;
        round.finalized_at = Some(now);
        round.final_score = Some(score);
        round.emergency = true;

        warn!(task_id, score = %score, submissions = round.submissions.len(), "Emergency finalize");
        Ok(settlement)
    }

    /// Slash an oracle through the oracle registry (owner-invoked).
    /// An `OutlierScore` reason must name a flagged candidate of a finalized
    /// round, within the review window. An oracle is slashed at most once per task.
    #[allow(clippy::too_many_arguments)]
    pub fn slash_outlier(
        &mut self,
        caller: &AccountId,
        oracle: &AccountId,
        reason: SlashReason,
        now: Timestamp,
        ledger: &mut impl Ledger,
        oracles: &mut OracleRegistry,
        events: &mut impl EventSink,
    ) -> Result<SlashOutcome> {
        self.ensure_owner(caller, "slash oracles")?;

        if let SlashReason::OutlierScore { task_id } = &reason {
            let round = self
                .rounds
                .get(task_id)
                .filter(|round| round.finalized)
                .ok_or(DataSealError::RoundNotFinalized(*task_id))?;
            if !round.slash_candidates.contains(oracle) {
                return Err(DataSealError::NotSlashCandidate {
                    task_id: *task_id,
                    oracle: oracle.clone(),
                });
            }
            let closed_at = round
                .finalized_at
                .unwrap_or_default()
                .saturating_add(self.params.slash_review_window);
            if now > closed_at {
                return Err(DataSealError::SlashWindowClosed {
                    task_id: *task_id,
                    closed_at,
                    now,
                });
            }
        }

        let task_id = reason.task_id();
        if let Some(task_id) = task_id {
            let slashed = self
                .rounds
                .get(&task_id)
                .map_or(false, |round| round.slashed.contains(oracle));
            if slashed {
                return Err(DataSealError::AlreadySlashed {
                    task_id,
                    oracle: oracle.clone(),
                });
            }
        }

        let outcome = oracles.slash(ledger, &self.identity, oracle, reason, now, events)?;

        if let Some(task_id) = task_id {
            self.rounds
                .get_or_insert_with(task_id, || ConsensusRound::new(task_id))
                .slashed
                .insert(oracle.clone());
            if let Some(reviews) = self.pending_slashes.get_mut(oracle) {
                reviews.remove(&task_id);
                if reviews.is_empty() {
                    self.pending_slashes.remove(oracle);
                }
            }
        }
        Ok(outcome)
    }

    /// Earliest open slash review against `oracle` at `now`, as (task, close time)
    pub fn pending_slash(&self, oracle: &AccountId, now: Timestamp) -> Option<(TaskId, Timestamp)> {
        self.pending_slashes
            .get(oracle)?
            .iter()
            .find(|(_, closes_at)| now <= **closes_at)
            .map(|(task_id, closes_at)| (*task_id, *closes_at))
    }

    /// Fails while a slash review is open against `oracle`
    pub fn ensure_no_pending_slash(&self, oracle: &AccountId, now: Timestamp) -> Result<()> {
        match self.pending_slash(oracle, now) {
            Some((task_id, until)) => Err(DataSealError::SlashPending {
                oracle: oracle.clone(),
                task_id,
                until,
            }),
            None => Ok(()),
        }
    }

    // Queries

    pub fn round(&self, task_id: TaskId) -> Option<&ConsensusRound> {
        self.rounds.get(&task_id)
    }

    pub fn submission_count(&self, task_id: TaskId) -> usize {
        self.rounds
            .get(&task_id)
            .map_or(0, |round| round.submissions.len())
    }

    pub fn submissions(&self, task_id: TaskId) -> &[Submission] {
        self.rounds
            .get(&task_id)
            .map_or(&[], |round| round.submissions.as_slice())
    }

    pub fn is_finalized(&self, task_id: TaskId) -> bool {
        self.rounds.get(&task_id).map_or(false, |round| round.finalized)
    }

    /// Finalized through consensus rather than the emergency path
    pub fn has_consensus(&self, task_id: TaskId) -> bool {
        self.rounds
            .get(&task_id)
            .map_or(false, |round| round.finalized && !round.emergency)
    }

    pub fn slash_candidates(&self, task_id: TaskId) -> Vec<AccountId> {
        self.rounds
            .get(&task_id)
            .map(|round| round.slash_candidates.clone())
            .unwrap_or_default()
    }

    /// Seconds left to submit. `None` once the task is no longer `Revealed`
    /// or the round is finalized.
    pub fn submission_time_remaining(
        &self,
        task_id: TaskId,
        now: Timestamp,
        tasks: &TaskRegistry,
    ) -> Result<Option<u64>> {
        let task = tasks.get_task(task_id)?;
        if task.state != TaskState::Revealed || self.is_finalized(task_id) {
            return Ok(None);
        }
        Ok(Some(
            self.window_closes_at(task_id, task.revealed_at)
                .map_or(self.params.submission_window, |closes| {
                    closes.saturating_sub(now)
                }),
        ))
    }
}

impl Transactional for VerificationAggregator {
    fn begin(&mut self) {
        self.rounds.begin();
        self.pending_slashes.begin();
    }

    fn commit(&mut self) {
        self.rounds.commit();
        self.pending_slashes.commit();
    }

    fn rollback(&mut self) {
        self.rounds.rollback();
        self.pending_slashes.rollback();
    }
}
