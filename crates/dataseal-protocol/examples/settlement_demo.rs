use dataseal_consensus::{attestation_key, sign_attestation, SigningKey};
use dataseal_protocol::{Protocol, ProtocolConfig, Tx};
use dataseal_tasks::compute_commitment;
use dataseal_types::{AccountId, Amount, Score};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 DataSeal Settlement Demo");
    println!("===========================");

    let mut protocol = Protocol::new(ProtocolConfig::default())?;
    let provider = AccountId::new("provider");
    let buyer = AccountId::new("buyer");

    protocol.deposit(&provider, Amount::from_units(100), 0)?;
    protocol.deposit(&buyer, Amount::from_units(100), 0)?;

    let signers: Vec<(AccountId, SigningKey)> = (1..=3u8)
        .map(|n| (AccountId::new(format!("oracle_{n}")), SigningKey::from_bytes(&[n; 32])))
        .collect();
    for (oracle, key) in &signers {
        protocol.deposit(oracle, Amount::from_units(200), 0)?;
        protocol.register_oracle(
            &Tx::new(oracle.clone(), 0).with_value(Amount::from_units(100)),
            attestation_key(key),
        )?;
    }
    println!("✅ {} oracles registered", protocol.active_oracles().len());

    let commitment = compute_commitment(b"weather-2026.parquet", b"salt", &provider);
    let stake = Amount::from_units(10);
    let task_id = protocol.commit(
        &Tx::new(provider.clone(), 10).with_value(stake),
        commitment,
        1,
        stake,
    )?;
    println!("📦 Task {} committed: {}", task_id, commitment);

    protocol.lock_buyer_funds(
        &Tx::new(buyer.clone(), 20).with_value(Amount::from_units(40)),
        task_id,
    )?;
    protocol.reveal(&Tx::new(provider.clone(), 30), task_id, "ipfs://weather-2026")?;

    let mut settle_after = None;
    for ((oracle, key), score) in signers.iter().zip([78u8, 84, 81]) {
        let score = Score::saturating(score);
        let attestation = sign_attestation(key, task_id, score, oracle);
        let receipt =
            protocol.submit_verification(&Tx::new(oracle.clone(), 40), task_id, score, attestation)?;
        println!(
            "🔍 {} scored {} ({} submissions)",
            oracle, score, receipt.outcome.submission_count
        );
        if let Some(consensus) = receipt.outcome.consensus {
            println!("🤝 Consensus at {}", consensus.round.final_score);
            settle_after = Some(consensus.settlement.settle_after);
        }
    }

    if let Some(at) = settle_after {
        let payout = protocol.settle(&Tx::new("keeper", at), task_id)?;
        println!(
            "💰 Settled: provider {} buyer {} treasury {}",
            payout.provider_amount, payout.buyer_amount, payout.treasury_amount
        );
    }

    println!("📜 {} events published", protocol.event_log().len());
    Ok(())
}
