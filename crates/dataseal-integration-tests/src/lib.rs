//! Shared fixtures for the end-to-end scenarios under `tests/`.

use dataseal_consensus::{attestation_key, sign_attestation, SigningKey};
use dataseal_protocol::{Protocol, ProtocolConfig, Result, SubmissionReceipt, Tx};
use dataseal_tasks::compute_commitment;
use dataseal_types::{AccountId, Amount, Score, TaskId, Timestamp};

pub const PROVIDER: &str = "provider";
pub const BUYER: &str = "buyer";
pub const OWNER: &str = "owner";

pub fn units(n: i64) -> Amount {
    Amount::from_units(n)
}

pub fn oracle(n: u8) -> AccountId {
    AccountId::new(format!("oracle_{n}"))
}

pub fn signer(n: u8) -> SigningKey {
    SigningKey::from_bytes(&[n; 32])
}

/// A funded protocol with `oracles` registered oracles
pub struct Network {
    pub protocol: Protocol,
}

impl Network {
    pub fn new(config: ProtocolConfig, oracles: u8) -> Result<Self> {
        let mut protocol = Protocol::new(config)?;
        protocol.deposit(&AccountId::new(PROVIDER), units(1_000), 0)?;
        protocol.deposit(&AccountId::new(BUYER), units(1_000), 0)?;
        for n in 1..=oracles {
            protocol.deposit(&oracle(n), units(1_000), 0)?;
            protocol.register_oracle(
                &Tx::new(oracle(n), 0).with_value(units(100)),
                attestation_key(&signer(n)),
            )?;
        }
        Ok(Network { protocol })
    }

    /// Commit an artifact with the provider's salt and stake 10 units
    pub fn commit(&mut self, artifact: &[u8], salt: &[u8], now: Timestamp) -> Result<TaskId> {
        let provider = AccountId::new(PROVIDER);
        let digest = compute_commitment(artifact, salt, &provider);
        self.protocol.commit(
            &Tx::new(provider, now).with_value(units(10)),
            digest,
            1,
            units(10),
        )
    }

    pub fn lock_buyer(&mut self, task_id: TaskId, amount: Amount, now: Timestamp) -> Result<()> {
        self.protocol
            .lock_buyer_funds(&Tx::new(BUYER, now).with_value(amount), task_id)
    }

    pub fn reveal(&mut self, task_id: TaskId, now: Timestamp) -> Result<Timestamp> {
        self.protocol
            .reveal(&Tx::new(PROVIDER, now), task_id, "ipfs://artifact")
    }

    pub fn submit(
        &mut self,
        n: u8,
        task_id: TaskId,
        score: u8,
        now: Timestamp,
    ) -> Result<SubmissionReceipt> {
        let score = Score::saturating(score);
        let attestation = sign_attestation(&signer(n), task_id, score, &oracle(n));
        self.protocol
            .submit_verification(&Tx::new(oracle(n), now), task_id, score, attestation)
    }

    pub fn balance(&self, account: &str) -> Amount {
        self.protocol.balance(&AccountId::new(account))
    }
}
