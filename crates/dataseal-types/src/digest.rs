use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{DataSealError, Result};

fn decode_fixed(hex_str: &str, what: &str) -> Result<[u8; 32]> {
    if hex_str.len() != 64 {
        return Err(DataSealError::InvalidCommitment(format!(
            "{} must be 64 hex characters",
            what
        )));
    }
    let bytes = hex::decode(hex_str)
        .map_err(|_| DataSealError::InvalidCommitment(format!("{}: invalid hex encoding", what)))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// SHA-256 digest binding an artifact, a secret salt and the provider identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitmentDigest(pub [u8; 32]);

impl CommitmentDigest {
    pub const ZERO: CommitmentDigest = CommitmentDigest([0u8; 32]);

    /// Parse from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        decode_fixed(hex_str, "commitment digest").map(CommitmentDigest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CommitmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentDigest({})", self.to_hex())
    }
}

impl fmt::Display for CommitmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CommitmentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CommitmentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CommitmentDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Public key (ed25519, 32 bytes) an oracle registers for signing attestations
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttestationKey(pub [u8; 32]);

impl AttestationKey {
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        decode_fixed(hex_str, "attestation key").map(AttestationKey)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for AttestationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttestationKey({})", self.to_hex())
    }
}

impl Serialize for AttestationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AttestationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AttestationKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque attestation bytes (an oracle signature, or a round receipt on a task)
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Attestation(pub Vec<u8>);

impl Attestation {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Attestation(bytes.into())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        hex::decode(hex_str)
            .map(Attestation)
            .map_err(|_| DataSealError::InvalidAttestation("invalid hex encoding".to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attestation({})", self.to_hex())
    }
}

impl Serialize for Attestation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Attestation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Attestation::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
