mod payout;
mod escrow;

pub use payout::{LinearPayout, PayoutConfig, PayoutPolicy, PayoutShape, ThresholdPayout};
pub use escrow::{EscrowAccounts, EscrowLedger, EscrowPosition, PayoutBreakdown, PositionStatus};

#[cfg(test)]
mod tests;
