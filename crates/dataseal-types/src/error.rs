use thiserror::Error;

use crate::{AccountId, Amount, MarketId, TaskId, TaskState, Timestamp};

/// Broad class of a rejected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wrong state, missed deadline, bad argument, unauthorized caller.
    /// Permanent for the given call: retrying with the same arguments fails again.
    Precondition,
    /// Rejections on the slashing path
    Economic,
    /// Arithmetic overflow, configuration or serialization problems
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSealError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Caller {caller} is not the provider of task {task_id}")]
    NotProvider { task_id: TaskId, caller: AccountId },

    #[error("Task {task_id} is {actual}, expected {expected}")]
    WrongState {
        task_id: TaskId,
        expected: TaskState,
        actual: TaskState,
    },

    #[error("Illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },

    #[error("Deadline exceeded for task {task_id}: deadline={deadline}, now={now}")]
    DeadlineExceeded {
        task_id: TaskId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Deadline not reached for task {task_id}: deadline={deadline}, now={now}")]
    DeadlineNotReached {
        task_id: TaskId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Insufficient stake: required={required}, provided={provided}")]
    InsufficientStake { required: Amount, provided: Amount },

    #[error("Attached value {attached} does not match declared amount {declared}")]
    ValueMismatch { declared: Amount, attached: Amount },

    #[error("Invalid commitment: {0}")]
    InvalidCommitment(String),

    #[error("Invalid market: {0}")]
    InvalidMarket(MarketId),

    #[error("Market already registered: {0}")]
    MarketExists(MarketId),

    #[error("Artifact pointer must not be empty")]
    EmptyArtifact,

    #[error("Score out of range [0, 100]: {0}")]
    InvalidScore(i64),

    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: AccountId, action: String },

    #[error("Oracle {oracle} already submitted for task {task_id}")]
    AlreadySubmitted { task_id: TaskId, oracle: AccountId },

    #[error("Task {0} is already finalized")]
    TaskFinalized(TaskId),

    #[error("Consensus round for task {0} is not finalized")]
    RoundNotFinalized(TaskId),

    #[error("Submission window for task {task_id} closed at {closed_at}, now={now}")]
    SubmissionWindowClosed {
        task_id: TaskId,
        closed_at: Timestamp,
        now: Timestamp,
    },

    #[error("Dispute window for task {0} is closed")]
    DisputeWindowClosed(TaskId),

    #[error("Task {task_id} is inside its dispute window until {until}")]
    SettlementLocked { task_id: TaskId, until: Timestamp },

    #[error("Oracle not found: {0}")]
    OracleNotFound(AccountId),

    #[error("Oracle already registered: {0}")]
    OracleAlreadyRegistered(AccountId),

    #[error("Oracle not active: {0}")]
    OracleInactive(AccountId),

    #[error("Invalid attestation: {0}")]
    InvalidAttestation(String),

    #[error("Oracle {oracle} is not a slash candidate for task {task_id}")]
    NotSlashCandidate { task_id: TaskId, oracle: AccountId },

    #[error("Oracle {oracle} was already slashed for task {task_id}")]
    AlreadySlashed { task_id: TaskId, oracle: AccountId },

    #[error("Oracle {oracle} is under slash review for task {task_id} until {until}")]
    SlashPending {
        oracle: AccountId,
        task_id: TaskId,
        until: Timestamp,
    },

    #[error("Slash review for task {task_id} closed at {closed_at}, now={now}")]
    SlashWindowClosed {
        task_id: TaskId,
        closed_at: Timestamp,
        now: Timestamp,
    },

    #[error("Oracle {0} has no stake left to slash")]
    NothingToSlash(AccountId),

    #[error("Escrow position not found for task {0}")]
    EscrowNotFound(TaskId),

    #[error("Escrow position for task {0} is closed")]
    EscrowClosed(TaskId),

    #[error("Buyer funds already locked for task {0}")]
    AlreadyLocked(TaskId),

    #[error("Insufficient balance: account={account}, required={required}, available={available}")]
    InsufficientBalance {
        account: AccountId,
        required: Amount,
        available: Amount,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DataSealError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DataSealError::NotSlashCandidate { .. }
            | DataSealError::AlreadySlashed { .. }
            | DataSealError::SlashPending { .. }
            | DataSealError::SlashWindowClosed { .. }
            | DataSealError::NothingToSlash(_) => ErrorCategory::Economic,
            DataSealError::ConfigError(_)
            | DataSealError::SerializationError(_)
            | DataSealError::Internal(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Precondition,
        }
    }

    pub fn unauthorized(caller: &AccountId, action: impl Into<String>) -> Self {
        DataSealError::Unauthorized {
            caller: caller.clone(),
            action: action.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataSealError>;
