use dataseal_types::{DataSealError, ProtocolEvent, Result};
use sha2::{Digest, Sha256};

const EVENT_DOMAIN: &[u8] = b"dataseal/event/v1";

/// Hash reference (hex-encoded SHA256)
pub type HashRef = String;

/// Stable identifier of a logged event: SHA256 over the sequence number and
/// the JSON payload. Redelivery of the same record yields the same id.
pub fn event_id(sequence: u64, event: &ProtocolEvent) -> Result<HashRef> {
    let payload =
        serde_json::to_vec(event).map_err(|e| DataSealError::SerializationError(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(EVENT_DOMAIN);
    hasher.update(sequence.to_le_bytes());
    hasher.update(&payload);
    Ok(hex::encode(hasher.finalize()))
}
