use serde::{Deserialize, Serialize};

use crate::{
    AccountId, Amount, CommitmentDigest, DisputeResolution, MarketId, Score, TaskId, TaskState,
    Timestamp,
};

/// Why an oracle is being slashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlashReason {
    /// Score fell outside the outlier band of a finalized round
    OutlierScore { task_id: TaskId },
    /// Off-band evidence supplied by the owner
    Misconduct {
        task_id: Option<TaskId>,
        evidence: String,
    },
}

impl SlashReason {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SlashReason::OutlierScore { task_id } => Some(*task_id),
            SlashReason::Misconduct { task_id, .. } => *task_id,
        }
    }
}

/// Structured record of a committed state transition.
/// The public event stream is the only way collaborators observe progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolEvent {
    Deposited {
        account: AccountId,
        amount: Amount,
    },
    MarketRegistered {
        market: MarketId,
    },
    TaskCommitted {
        task_id: TaskId,
        provider: AccountId,
        market: MarketId,
        stake: Amount,
        commitment: CommitmentDigest,
        reveal_deadline: Timestamp,
    },
    StakeLocked {
        task_id: TaskId,
        provider: AccountId,
        amount: Amount,
    },
    BuyerFundsLocked {
        task_id: TaskId,
        buyer: AccountId,
        amount: Amount,
    },
    TaskRevealed {
        task_id: TaskId,
        artifact_pointer: String,
        validation_deadline: Timestamp,
    },
    VerificationSubmitted {
        task_id: TaskId,
        oracle: AccountId,
        score: Score,
        submission_count: usize,
    },
    ConsensusReached {
        task_id: TaskId,
        final_score: Score,
        submission_count: usize,
        in_band: usize,
    },
    SlashCandidateFlagged {
        task_id: TaskId,
        oracle: AccountId,
        score: Score,
    },
    TaskValidated {
        task_id: TaskId,
        score: Score,
        verifier: AccountId,
        emergency: bool,
    },
    EscrowReleased {
        task_id: TaskId,
        provider: AccountId,
        provider_amount: Amount,
        buyer: Option<AccountId>,
        buyer_amount: Amount,
        treasury_amount: Amount,
    },
    EscrowRefunded {
        task_id: TaskId,
        provider: AccountId,
        stake: Amount,
        buyer: Option<AccountId>,
        buyer_amount: Amount,
    },
    TaskSettled {
        task_id: TaskId,
    },
    TaskDisputed {
        task_id: TaskId,
        raised_by: AccountId,
        from: TaskState,
    },
    DisputeResolved {
        task_id: TaskId,
        resolution: DisputeResolution,
    },
    TaskCancelled {
        task_id: TaskId,
        from: TaskState,
    },
    OracleRegistered {
        oracle: AccountId,
        stake: Amount,
    },
    OracleStakeIncreased {
        oracle: AccountId,
        amount: Amount,
        total_stake: Amount,
        reactivated: bool,
    },
    OracleDeactivated {
        oracle: AccountId,
        returned_stake: Amount,
        forced: bool,
    },
    ReputationUpdated {
        oracle: AccountId,
        success: bool,
        reputation: u8,
    },
    OracleSlashed {
        oracle: AccountId,
        reason: SlashReason,
        amount: Amount,
        remaining_stake: Amount,
        reputation: u8,
    },
}

impl ProtocolEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::Deposited { .. } => "Deposited",
            ProtocolEvent::MarketRegistered { .. } => "MarketRegistered",
            ProtocolEvent::TaskCommitted { .. } => "TaskCommitted",
            ProtocolEvent::StakeLocked { .. } => "StakeLocked",
            ProtocolEvent::BuyerFundsLocked { .. } => "BuyerFundsLocked",
            ProtocolEvent::TaskRevealed { .. } => "TaskRevealed",
            ProtocolEvent::VerificationSubmitted { .. } => "VerificationSubmitted",
            ProtocolEvent::ConsensusReached { .. } => "ConsensusReached",
            ProtocolEvent::SlashCandidateFlagged { .. } => "SlashCandidateFlagged",
            ProtocolEvent::TaskValidated { .. } => "TaskValidated",
            ProtocolEvent::EscrowReleased { .. } => "EscrowReleased",
            ProtocolEvent::EscrowRefunded { .. } => "EscrowRefunded",
            ProtocolEvent::TaskSettled { .. } => "TaskSettled",
            ProtocolEvent::TaskDisputed { .. } => "TaskDisputed",
            ProtocolEvent::DisputeResolved { .. } => "DisputeResolved",
            ProtocolEvent::TaskCancelled { .. } => "TaskCancelled",
            ProtocolEvent::OracleRegistered { .. } => "OracleRegistered",
            ProtocolEvent::OracleStakeIncreased { .. } => "OracleStakeIncreased",
            ProtocolEvent::OracleDeactivated { .. } => "OracleDeactivated",
            ProtocolEvent::ReputationUpdated { .. } => "ReputationUpdated",
            ProtocolEvent::OracleSlashed { .. } => "OracleSlashed",
        }
    }

    /// Task the event concerns, if any
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            ProtocolEvent::TaskCommitted { task_id, .. }
            | ProtocolEvent::StakeLocked { task_id, .. }
            | ProtocolEvent::BuyerFundsLocked { task_id, .. }
            | ProtocolEvent::TaskRevealed { task_id, .. }
            | ProtocolEvent::VerificationSubmitted { task_id, .. }
            | ProtocolEvent::ConsensusReached { task_id, .. }
            | ProtocolEvent::SlashCandidateFlagged { task_id, .. }
            | ProtocolEvent::TaskValidated { task_id, .. }
            | ProtocolEvent::EscrowReleased { task_id, .. }
            | ProtocolEvent::EscrowRefunded { task_id, .. }
            | ProtocolEvent::TaskSettled { task_id }
            | ProtocolEvent::TaskDisputed { task_id, .. }
            | ProtocolEvent::DisputeResolved { task_id, .. }
            | ProtocolEvent::TaskCancelled { task_id, .. } => Some(*task_id),
            ProtocolEvent::OracleSlashed { reason, .. } => reason.task_id(),
            _ => None,
        }
    }
}

/// Destination for events produced inside a transaction
pub trait EventSink {
    fn emit(&mut self, event: ProtocolEvent);
}

impl EventSink for Vec<ProtocolEvent> {
    fn emit(&mut self, event: ProtocolEvent) {
        self.push(event);
    }
}
