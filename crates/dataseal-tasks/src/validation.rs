use dataseal_types::{Amount, CommitmentDigest, DataSealError, Result};

/// Longest accepted artifact pointer, in bytes
pub const MAX_POINTER_LEN: usize = 2048;

/// A commitment must not be the all-zero digest
pub fn validate_commitment(commitment: &CommitmentDigest) -> Result<()> {
    if commitment.is_zero() {
        return Err(DataSealError::InvalidCommitment(
            "commitment digest must be non-zero".to_string(),
        ));
    }
    Ok(())
}

/// The attached value must equal the declared stake, and the stake must meet the minimum
pub fn validate_stake(declared: Amount, attached: Amount, minimum: Amount) -> Result<()> {
    if declared != attached {
        return Err(DataSealError::ValueMismatch { declared, attached });
    }
    if declared < minimum {
        return Err(DataSealError::InsufficientStake {
            required: minimum,
            provided: declared,
        });
    }
    Ok(())
}

/// Validate an artifact pointer for basic consistency
pub fn validate_artifact_pointer(pointer: &str) -> Result<()> {
    if pointer.trim().is_empty() {
        return Err(DataSealError::EmptyArtifact);
    }
    if pointer.len() > MAX_POINTER_LEN {
        return Err(DataSealError::InvalidCommitment(format!(
            "artifact pointer longer than {} bytes",
            MAX_POINTER_LEN
        )));
    }
    Ok(())
}
