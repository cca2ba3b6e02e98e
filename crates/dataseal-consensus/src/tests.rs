// Tests for the verification aggregator

#[cfg(test)]
mod tests {
    use crate::*;
    use dataseal_ledger::{Ledger, MemoryLedger};
    use dataseal_oracle::{OracleAccounts, OracleParams, OracleRegistry, SlashOutcome};
    use dataseal_tasks::{TaskAuthorities, TaskParams, TaskRegistry};
    use dataseal_types::*;
    use proptest::prelude::*;

    const REVEALED_AT: Timestamp = 10;

    fn owner() -> AccountId {
        AccountId::new("owner")
    }

    fn aggregator_id() -> AccountId {
        AccountId::new("aggregator")
    }

    fn oracle(n: u8) -> AccountId {
        AccountId::new(format!("oracle_{n}"))
    }

    fn signer(n: u8) -> SigningKey {
        SigningKey::from_bytes(&[n; 32])
    }

    fn score(v: u8) -> Score {
        Score::new(v).unwrap()
    }

    struct Harness {
        ledger: MemoryLedger,
        tasks: TaskRegistry,
        oracles: OracleRegistry,
        aggregator: VerificationAggregator,
        events: Vec<ProtocolEvent>,
        task_id: TaskId,
    }

    impl Harness {
        fn new(params: ConsensusParams) -> Self {
            let mut ledger = MemoryLedger::new();
            let mut events: Vec<ProtocolEvent> = Vec::new();
            let mut tasks = TaskRegistry::new(
                TaskParams::default(),
                TaskAuthorities {
                    owner: owner(),
                    aggregator: aggregator_id(),
                    escrow: AccountId::new("escrow"),
                },
                [1],
            );
            let mut oracles = OracleRegistry::new(
                OracleParams::default(),
                OracleAccounts {
                    aggregator: aggregator_id(),
                    stake_vault: AccountId::new("oracle_vault"),
                    treasury: AccountId::new("treasury"),
                },
            );

            for n in 1..=4 {
                ledger
                    .deposit(&oracle(n), Amount::from_units(1_000))
                    .unwrap();
                oracles
                    .register(
                        &mut ledger,
                        &oracle(n),
                        attestation_key(&signer(n)),
                        Amount::from_units(100),
                        0,
                        &mut events,
                    )
                    .unwrap();
            }

            let provider = AccountId::new("provider");
            let stake = Amount::from_units(10);
            let task_id = tasks
                .commit(
                    &provider,
                    CommitmentDigest([5u8; 32]),
                    1,
                    stake,
                    stake,
                    0,
                    &mut events,
                )
                .unwrap();
            tasks
                .reveal(&provider, task_id, "ipfs://artifact", REVEALED_AT, &mut events)
                .unwrap();

            Harness {
                ledger,
                tasks,
                oracles,
                aggregator: VerificationAggregator::new(params, aggregator_id(), owner()),
                events,
                task_id,
            }
        }

        fn submit(&mut self, n: u8, value: u8, now: Timestamp) -> Result<SubmissionOutcome> {
            let attestation = sign_attestation(&signer(n), self.task_id, score(value), &oracle(n));
            self.aggregator.submit_verification(
                &oracle(n),
                self.task_id,
                score(value),
                attestation,
                now,
                &mut self.tasks,
                &mut self.oracles,
                &mut self.events,
            )
        }

        fn slash(&mut self, caller: &AccountId, n: u8, reason: SlashReason) -> Result<SlashOutcome> {
            self.aggregator.slash_outlier(
                caller,
                &oracle(n),
                reason,
                200,
                &mut self.ledger,
                &mut self.oracles,
                &mut self.events,
            )
        }

        fn state(&self) -> TaskState {
            self.tasks.get_task(self.task_id).unwrap().state
        }
    }

    fn harness() -> Harness {
        Harness::new(ConsensusParams::default())
    }

    #[test]
    fn test_two_agreeing_oracles_validate_task() {
        let mut h = harness();

        let first = h.submit(1, 85, 20).unwrap();
        assert_eq!(first.submission_count, 1);
        assert!(first.consensus.is_none());
        assert_eq!(h.state(), TaskState::Revealed);

        let second = h.submit(2, 87, 21).unwrap();
        let consensus = second.consensus.unwrap();
        assert_eq!(consensus.round.final_score.value(), 86);
        assert_eq!(consensus.settlement.score.value(), 86);
        assert_eq!(consensus.settlement.settle_after, 21 + 3_600 + 1);

        let task = h.tasks.get_task(h.task_id).unwrap();
        assert_eq!(task.state, TaskState::Validated);
        assert_eq!(task.score, Some(score(86)));
        assert_eq!(task.verifier, Some(oracle(1)));
        assert_eq!(task.attestation.as_ref(), Some(&consensus.round.receipt));

        assert!(h.aggregator.has_consensus(h.task_id));
        assert_eq!(h.oracles.oracle(&oracle(1)).unwrap().reputation, 52);
        assert_eq!(h.oracles.oracle(&oracle(2)).unwrap().reputation, 52);
    }

    #[test]
    fn test_disagreeing_oracles_do_not_finalize() {
        let mut h = harness();
        h.submit(1, 85, 20).unwrap();
        let outcome = h.submit(2, 50, 21).unwrap();
        assert!(outcome.consensus.is_none());
        assert_eq!(h.state(), TaskState::Revealed);
        assert!(!h.aggregator.is_finalized(h.task_id));
        assert_eq!(h.aggregator.submission_count(h.task_id), 2);
    }

    #[test]
    fn test_outlier_is_flagged_and_loses_reputation() {
        let mut h = harness();
        h.submit(3, 20, 20).unwrap();
        assert!(h.submit(1, 80, 21).unwrap().consensus.is_none());
        let consensus = h.submit(2, 82, 22).unwrap().consensus.unwrap();

        assert_eq!(consensus.round.final_score.value(), 80);
        assert_eq!(h.aggregator.slash_candidates(h.task_id), vec![oracle(3)]);
        assert_eq!(h.oracles.oracle(&oracle(3)).unwrap().reputation, 45);
        assert!(h.events.iter().any(|e| matches!(
            e,
            ProtocolEvent::SlashCandidateFlagged { oracle: o, .. } if *o == oracle(3)
        )));
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let mut h = harness();
        h.submit(1, 85, 20).unwrap();
        assert_eq!(
            h.submit(1, 86, 21).unwrap_err(),
            DataSealError::AlreadySubmitted {
                task_id: h.task_id,
                oracle: oracle(1),
            }
        );
    }

    #[test]
    fn test_submission_after_consensus_rejected() {
        let mut h = harness();
        h.submit(1, 85, 20).unwrap();
        h.submit(2, 87, 21).unwrap();
        assert_eq!(
            h.submit(3, 86, 22).unwrap_err(),
            DataSealError::TaskFinalized(h.task_id)
        );
    }

    #[test]
    fn test_submission_window_is_inclusive() {
        let mut h = harness();
        let closes = REVEALED_AT + 300;
        h.submit(1, 85, closes).unwrap();
        assert_eq!(
            h.submit(2, 85, closes + 1).unwrap_err(),
            DataSealError::SubmissionWindowClosed {
                task_id: h.task_id,
                closed_at: closes,
                now: closes + 1,
            }
        );
    }

    #[test]
    fn test_window_anchored_on_first_submission() {
        let mut h = Harness::new(ConsensusParams {
            window_anchor: WindowAnchor::FirstSubmission,
            ..ConsensusParams::default()
        });
        assert_eq!(
            h.aggregator
                .submission_time_remaining(h.task_id, 1_000, &h.tasks)
                .unwrap(),
            Some(300)
        );
        h.submit(1, 85, 1_000).unwrap();
        assert_eq!(
            h.aggregator
                .submission_time_remaining(h.task_id, 1_100, &h.tasks)
                .unwrap(),
            Some(200)
        );
        assert!(h.submit(2, 85, 1_300).unwrap().consensus.is_some());
    }

    #[test]
    fn test_invalid_attestation_rejected() {
        let mut h = harness();
        // Signed by another oracle's key
        let forged = sign_attestation(&signer(2), h.task_id, score(85), &oracle(1));
        let result = h.aggregator.submit_verification(
            &oracle(1),
            h.task_id,
            score(85),
            forged,
            20,
            &mut h.tasks,
            &mut h.oracles,
            &mut h.events,
        );
        assert!(matches!(result, Err(DataSealError::InvalidAttestation(_))));
        assert_eq!(h.aggregator.submission_count(h.task_id), 0);
    }

    #[test]
    fn test_unregistered_and_inactive_oracles_rejected() {
        let mut h = harness();
        assert_eq!(
            h.submit(9, 85, 20).unwrap_err(),
            DataSealError::OracleNotFound(oracle(9))
        );

        h.oracles
            .deactivate(&mut h.ledger, &oracle(1), 15, &mut h.events)
            .unwrap();
        assert_eq!(
            h.submit(1, 85, 20).unwrap_err(),
            DataSealError::OracleInactive(oracle(1))
        );
    }

    #[test]
    fn test_submission_requires_revealed_task() {
        let mut h = harness();
        let provider = AccountId::new("provider");
        let stake = Amount::from_units(10);
        let pending = h
            .tasks
            .commit(&provider, CommitmentDigest([6u8; 32]), 1, stake, stake, 12, &mut h.events)
            .unwrap();
        let attestation = sign_attestation(&signer(1), pending, score(85), &oracle(1));
        let result = h.aggregator.submit_verification(
            &oracle(1),
            pending,
            score(85),
            attestation,
            20,
            &mut h.tasks,
            &mut h.oracles,
            &mut h.events,
        );
        assert!(matches!(result, Err(DataSealError::WrongState { .. })));
    }

    #[test]
    fn test_emergency_finalize() {
        let mut h = harness();
        h.submit(1, 85, 20).unwrap();
        h.submit(2, 40, 21).unwrap();

        assert!(matches!(
            h.aggregator
                .emergency_finalize(&oracle(1), h.task_id, score(70), 30, &mut h.tasks, &mut h.events),
            Err(DataSealError::Unauthorized { .. })
        ));

        let settlement = h
            .aggregator
            .emergency_finalize(&owner(), h.task_id, score(70), 30, &mut h.tasks, &mut h.events)
            .unwrap();
        assert_eq!(settlement.score, score(70));
        assert_eq!(h.state(), TaskState::Validated);
        assert!(h.aggregator.is_finalized(h.task_id));
        assert!(!h.aggregator.has_consensus(h.task_id));

        // Reputation untouched
        assert_eq!(h.oracles.oracle(&oracle(1)).unwrap().reputation, 50);
        assert_eq!(
            h.aggregator
                .emergency_finalize(&owner(), h.task_id, score(70), 31, &mut h.tasks, &mut h.events)
                .unwrap_err(),
            DataSealError::TaskFinalized(h.task_id)
        );
    }

    #[test]
    fn test_slash_outlier_rules() {
        let mut h = harness();
        let reason = SlashReason::OutlierScore { task_id: h.task_id };

        assert_eq!(
            h.slash(&owner(), 3, reason.clone()).unwrap_err(),
            DataSealError::RoundNotFinalized(h.task_id)
        );

        h.submit(3, 20, 20).unwrap();
        h.submit(1, 80, 21).unwrap();
        h.submit(2, 82, 22).unwrap();

        assert!(matches!(
            h.slash(&oracle(1), 3, reason.clone()),
            Err(DataSealError::Unauthorized { .. })
        ));
        assert_eq!(
            h.slash(&owner(), 1, reason.clone()).unwrap_err(),
            DataSealError::NotSlashCandidate {
                task_id: h.task_id,
                oracle: oracle(1),
            }
        );

        let outcome = h.slash(&owner(), 3, reason.clone()).unwrap();
        assert_eq!(outcome.amount, Amount::from_units(10));
        assert_eq!(h.ledger.balance(&AccountId::new("treasury")), Amount::from_units(10));

        let again = h.slash(&owner(), 3, reason).unwrap_err();
        assert_eq!(again.category(), ErrorCategory::Economic);
        assert_eq!(
            again,
            DataSealError::AlreadySlashed {
                task_id: h.task_id,
                oracle: oracle(3),
            }
        );
    }

    #[test]
    fn test_misconduct_slash_without_round() {
        let mut h = harness();
        let reason = SlashReason::Misconduct {
            task_id: None,
            evidence: "key leaked".to_string(),
        };
        h.slash(&owner(), 4, reason.clone()).unwrap();
        // Without a task there is nothing to deduplicate against
        h.slash(&owner(), 4, reason).unwrap();
        assert_eq!(h.oracles.oracle(&oracle(4)).unwrap().slash_count, 2);
    }

    #[test]
    fn test_withdrawn_oracle_no_longer_counts() {
        let mut h = harness();
        h.submit(1, 85, 20).unwrap();
        h.oracles
            .deactivate(&mut h.ledger, &oracle(1), 21, &mut h.events)
            .unwrap();

        // oracle_1's score stays on record but no longer makes a pair with 87
        assert!(h.submit(2, 87, 22).unwrap().consensus.is_none());
        assert_eq!(h.aggregator.submission_count(h.task_id), 2);
        assert_eq!(h.state(), TaskState::Revealed);

        let consensus = h.submit(3, 86, 23).unwrap().consensus.unwrap();
        assert_eq!(consensus.round.final_score.value(), 87);
        assert_eq!(consensus.round.in_band, vec![oracle(2), oracle(3)]);
        assert!(consensus.round.out_of_band.is_empty());

        let withdrawn = h.oracles.oracle(&oracle(1)).unwrap();
        assert_eq!(withdrawn.reputation, 50);
        assert_eq!(withdrawn.total_validations, 0);
    }

    #[test]
    fn test_slash_candidate_cannot_withdraw_during_review() {
        let mut h = harness();
        h.submit(3, 20, 20).unwrap();
        h.submit(1, 80, 21).unwrap();
        h.submit(2, 82, 22).unwrap();

        let closes_at = 22 + ConsensusParams::default().slash_review_window;
        assert_eq!(
            h.aggregator.pending_slash(&oracle(3), 200),
            Some((h.task_id, closes_at))
        );
        let blocked = h
            .aggregator
            .ensure_no_pending_slash(&oracle(3), 200)
            .unwrap_err();
        assert_eq!(blocked.category(), ErrorCategory::Economic);
        assert_eq!(
            blocked,
            DataSealError::SlashPending {
                oracle: oracle(3),
                task_id: h.task_id,
                until: closes_at,
            }
        );
        assert!(h.aggregator.ensure_no_pending_slash(&oracle(1), 200).is_ok());

        h.slash(&owner(), 3, SlashReason::OutlierScore { task_id: h.task_id })
            .unwrap();
        assert_eq!(h.aggregator.pending_slash(&oracle(3), 200), None);
    }

    #[test]
    fn test_slash_review_window_closes() {
        let mut h = harness();
        h.submit(3, 20, 20).unwrap();
        h.submit(1, 80, 21).unwrap();
        h.submit(2, 82, 22).unwrap();

        let closes_at = 22 + ConsensusParams::default().slash_review_window;
        assert!(h.aggregator.ensure_no_pending_slash(&oracle(3), closes_at + 1).is_ok());
        assert_eq!(
            h.aggregator.slash_outlier(
                &owner(),
                &oracle(3),
                SlashReason::OutlierScore { task_id: h.task_id },
                closes_at + 1,
                &mut h.ledger,
                &mut h.oracles,
                &mut h.events,
            ),
            Err(DataSealError::SlashWindowClosed {
                task_id: h.task_id,
                closed_at: closes_at,
                now: closes_at + 1,
            })
        );
        assert_eq!(h.oracles.oracle(&oracle(3)).unwrap().stake, Amount::from_units(100));
    }

    #[test]
    fn test_failed_slash_leaves_no_dedup_mark() {
        let mut h = harness();
        h.submit(3, 20, 20).unwrap();
        h.submit(1, 80, 21).unwrap();
        h.submit(2, 82, 22).unwrap();
        // Bypasses the facade's review check to empty the stake directly
        h.oracles
            .deactivate(&mut h.ledger, &oracle(3), 30, &mut h.events)
            .unwrap();

        let reason = SlashReason::OutlierScore { task_id: h.task_id };
        assert_eq!(
            h.slash(&owner(), 3, reason.clone()).unwrap_err(),
            DataSealError::NothingToSlash(oracle(3))
        );
        assert!(!h.aggregator.round(h.task_id).unwrap().slashed.contains(&oracle(3)));
        assert!(h.aggregator.pending_slash(&oracle(3), 200).is_some());
    }

    #[test]
    fn test_queries() {
        let mut h = harness();
        assert_eq!(h.aggregator.submission_count(h.task_id), 0);
        assert!(h.aggregator.submissions(h.task_id).is_empty());
        assert_eq!(
            h.aggregator
                .submission_time_remaining(h.task_id, 110, &h.tasks)
                .unwrap(),
            Some(200)
        );

        h.submit(1, 85, 20).unwrap();
        assert_eq!(h.aggregator.submissions(h.task_id)[0].oracle, oracle(1));
        h.submit(2, 85, 21).unwrap();
        assert_eq!(
            h.aggregator
                .submission_time_remaining(h.task_id, 30, &h.tasks)
                .unwrap(),
            None
        );
        assert!(matches!(
            h.aggregator.submission_time_remaining(99, 30, &h.tasks),
            Err(DataSealError::TaskNotFound(99))
        ));
    }

    #[test]
    fn test_params_validation() {
        assert!(ConsensusParams::default().validate().is_ok());
        let bad = ConsensusParams {
            min_submissions: 0,
            ..ConsensusParams::default()
        };
        assert!(matches!(bad.validate(), Err(DataSealError::ConfigError(_))));
    }

    fn round_of(scores: &[u8]) -> ConsensusRound {
        let mut round = ConsensusRound::new(1);
        for (i, value) in scores.iter().enumerate() {
            round.submissions.push(Submission {
                oracle: AccountId::new(format!("o{i:02}")),
                score: score(*value),
                attestation: Attestation::default(),
                submitted_at: i as u64,
            });
        }
        round
    }

    proptest! {
        #[test]
        fn prop_final_score_is_order_independent(
            scores in prop::collection::vec(0u8..=100, 1..8),
            rotate in 0usize..8,
        ) {
            let forward = round_of(&scores);
            let mut shuffled = forward.clone();
            let len = shuffled.submissions.len();
            shuffled.submissions.rotate_left(rotate % len);
            shuffled.submissions.reverse();

            let a = forward.evaluate(2, 1_500, 3);
            let b = shuffled.evaluate(2, 1_500, 3);
            prop_assert_eq!(a.is_some(), b.is_some());
            if let (Some(a), Some(b)) = (a, b) {
                prop_assert_eq!(a.final_score, b.final_score);
                prop_assert_eq!(a.receipt, b.receipt);
            }
        }

        #[test]
        fn prop_final_score_within_submitted_range(
            scores in prop::collection::vec(0u8..=100, 2..8),
        ) {
            if let Some(outcome) = round_of(&scores).evaluate(2, 1_500, 3) {
                let lo = *scores.iter().min().unwrap();
                let hi = *scores.iter().max().unwrap();
                prop_assert!(outcome.final_score.value() >= lo);
                prop_assert!(outcome.final_score.value() <= hi);
            }
        }
    }
}
