/// Task identifier (monotonic counter assigned by the task registry)
pub type TaskId = u64;

/// Market / category identifier
pub type MarketId = u64;

/// Ledger time in whole seconds
pub type Timestamp = u64;
