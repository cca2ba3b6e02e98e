mod aggregator;
pub mod attestation;
pub mod median;
mod round;

pub use aggregator::{ConsensusOutcome, ConsensusParams, SubmissionOutcome, VerificationAggregator, WindowAnchor};
pub use attestation::{attestation_key, attestation_message, sign_attestation, verify_attestation};
pub use ed25519_dalek::SigningKey;
pub use round::{ConsensusRound, RoundOutcome, Submission};

#[cfg(test)]
mod tests;
