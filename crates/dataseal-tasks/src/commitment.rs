use dataseal_types::{AccountId, CommitmentDigest};
use sha2::{Digest, Sha256};

const COMMITMENT_DOMAIN: &[u8] = b"dataseal/commitment/v1";

fn update_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

/// Compute commitment digest: H(domain || len(artifact) || artifact || len(salt) || salt || len(provider) || provider)
///
/// Every field is length-prefixed so no two distinct (artifact, salt, provider)
/// triples share an encoding.
pub fn compute_commitment(artifact: &[u8], salt: &[u8], provider: &AccountId) -> CommitmentDigest {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    update_prefixed(&mut hasher, artifact);
    update_prefixed(&mut hasher, salt);
    update_prefixed(&mut hasher, provider.as_bytes());
    CommitmentDigest(hasher.finalize().into())
}

/// Verify a commitment against artifact, salt and provider
pub fn verify_commitment(
    commitment: &CommitmentDigest,
    artifact: &[u8],
    salt: &[u8],
    provider: &AccountId,
) -> bool {
    compute_commitment(artifact, salt, provider) == *commitment
}
