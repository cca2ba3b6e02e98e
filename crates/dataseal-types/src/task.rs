use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountId, Amount, Attestation, CommitmentDigest, MarketId, Score, TaskId, Timestamp};
use crate::error::{DataSealError, Result};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Commitment published, artifact still hidden
    Committed,
    /// Artifact pointer published, oracles may score it
    Revealed,
    /// Final score recorded, awaiting payout
    Validated,
    /// Payout processed
    Settled,
    /// Frozen pending owner resolution
    Disputed,
    /// Abandoned or rejected; funds refunded
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Settled | TaskState::Cancelled)
    }

    /// The only edges a task may ever take
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Committed, Revealed)
                | (Committed, Cancelled)
                | (Revealed, Validated)
                | (Revealed, Disputed)
                | (Revealed, Cancelled)
                | (Validated, Settled)
                | (Validated, Disputed)
                | (Disputed, Validated)
                | (Disputed, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Committed => "COMMITTED",
            TaskState::Revealed => "REVEALED",
            TaskState::Validated => "VALIDATED",
            TaskState::Settled => "SETTLED",
            TaskState::Disputed => "DISPUTED",
            TaskState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner ruling on a disputed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ruling", rename_all = "snake_case")]
pub enum DisputeResolution {
    /// Accept the task with the given score; settlement proceeds
    Validate { score: Score },
    /// Reject the task; buyer funds and stake are refunded
    Cancel,
}

/// One provider's commit-reveal-verify-settle cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub commitment: CommitmentDigest,
    pub provider: AccountId,
    pub market: MarketId,
    pub stake: Amount,
    pub created_at: Timestamp,
    pub reveal_deadline: Timestamp,
    pub validation_deadline: Option<Timestamp>,
    pub artifact_pointer: Option<String>,
    pub score: Option<Score>,
    pub verifier: Option<AccountId>,
    pub attestation: Option<Attestation>,
    pub state: TaskState,
    pub revealed_at: Option<Timestamp>,
    pub validated_at: Option<Timestamp>,
    pub disputed_at: Option<Timestamp>,
    pub disputed_by: Option<AccountId>,
    pub disputed_from: Option<TaskState>,
    pub closed_at: Option<Timestamp>,
}

impl Task {
    /// Fresh `Committed` task
    pub fn committed(
        id: TaskId,
        commitment: CommitmentDigest,
        provider: AccountId,
        market: MarketId,
        stake: Amount,
        created_at: Timestamp,
        commit_window: u64,
    ) -> Self {
        Task {
            id,
            commitment,
            provider,
            market,
            stake,
            created_at,
            reveal_deadline: created_at.saturating_add(commit_window),
            validation_deadline: None,
            artifact_pointer: None,
            score: None,
            verifier: None,
            attestation: None,
            state: TaskState::Committed,
            revealed_at: None,
            validated_at: None,
            disputed_at: None,
            disputed_by: None,
            disputed_from: None,
            closed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Fail with `WrongState` unless the task is in `expected`
    pub fn ensure_state(&self, expected: TaskState) -> Result<()> {
        if self.state != expected {
            return Err(DataSealError::WrongState {
                task_id: self.id,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Move along a legal edge; terminal tasks never change
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DataSealError::IllegalTransition {
                task_id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Reveal is allowed up to and including the deadline
    pub fn within_reveal_window(&self, now: Timestamp) -> bool {
        now <= self.reveal_deadline
    }

    pub fn within_validation_window(&self, now: Timestamp) -> bool {
        self.validation_deadline.map_or(false, |deadline| now <= deadline)
    }

    /// Time of the transition a dispute would be raised against
    pub fn dispute_anchor(&self) -> Option<Timestamp> {
        match self.state {
            TaskState::Revealed => self.revealed_at,
            TaskState::Validated => self.validated_at,
            _ => None,
        }
    }

    /// A zero grace window means disputes are disabled
    pub fn dispute_window_open(&self, now: Timestamp, grace: u64) -> bool {
        grace > 0
            && self
                .dispute_anchor()
                .map_or(false, |at| now <= at.saturating_add(grace))
    }

    /// Deadline governing the current phase, if any
    pub fn phase_deadline(&self) -> Option<Timestamp> {
        match self.state {
            TaskState::Committed => Some(self.reveal_deadline),
            TaskState::Revealed => self.validation_deadline,
            _ => None,
        }
    }
}
