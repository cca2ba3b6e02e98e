use dataseal_types::{AccountId, Attestation, AttestationKey, DataSealError, Result, Score, TaskId};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

const ATTESTATION_DOMAIN: &[u8] = b"dataseal/attestation/v1";

/// Bytes an oracle signs for one score:
/// domain || task_id (u64 LE) || score (u8) || len(submitter) (u32 LE) || submitter
pub fn attestation_message(task_id: TaskId, score: Score, submitter: &AccountId) -> Vec<u8> {
    let submitter = submitter.as_bytes();
    let mut message = Vec::with_capacity(ATTESTATION_DOMAIN.len() + 13 + submitter.len());
    message.extend_from_slice(ATTESTATION_DOMAIN);
    message.extend_from_slice(&task_id.to_le_bytes());
    message.push(score.value());
    message.extend_from_slice(&(submitter.len() as u32).to_le_bytes());
    message.extend_from_slice(submitter);
    message
}

/// Sign a score with the oracle's key
pub fn sign_attestation(
    signing_key: &SigningKey,
    task_id: TaskId,
    score: Score,
    submitter: &AccountId,
) -> Attestation {
    let signature = signing_key.sign(&attestation_message(task_id, score, submitter));
    Attestation::new(signature.to_bytes().to_vec())
}

/// Check an attestation against the oracle's registered key
pub fn verify_attestation(
    key: &AttestationKey,
    task_id: TaskId,
    score: Score,
    submitter: &AccountId,
    attestation: &Attestation,
) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(key.as_bytes())
        .map_err(|_| DataSealError::InvalidAttestation("malformed attestation key".to_string()))?;
    let signature = Signature::from_slice(attestation.as_bytes())
        .map_err(|_| DataSealError::InvalidAttestation("malformed signature".to_string()))?;
    verifying_key
        .verify(&attestation_message(task_id, score, submitter), &signature)
        .map_err(|_| DataSealError::InvalidAttestation("signature does not verify".to_string()))
}

/// Public half of a signing key in registry form
pub fn attestation_key(signing_key: &SigningKey) -> AttestationKey {
    AttestationKey(signing_key.verifying_key().to_bytes())
}
