mod registry;
pub mod commitment;
mod validation;

pub use registry::{SettlementRequest, TaskAuthorities, TaskParams, TaskRegistry};
pub use commitment::{compute_commitment, verify_commitment};
pub use validation::{validate_artifact_pointer, validate_commitment, validate_stake};
