use dataseal_types::{AccountId, Attestation, Score, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::median::{deviation_x2, final_score, is_outlier, median_x2, within_band};

const RECEIPT_DOMAIN: &[u8] = b"dataseal/round/v1";

/// One oracle's score for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub oracle: AccountId,
    pub score: Score,
    pub attestation: Attestation,
    pub submitted_at: Timestamp,
}

/// Result of evaluating a round that reached consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub final_score: Score,
    /// Oracles within the tolerance band, in arrival order
    pub in_band: Vec<AccountId>,
    /// Oracles outside the band, in arrival order
    pub out_of_band: Vec<AccountId>,
    /// Oracles beyond the outlier multiple of the band
    pub slash_candidates: Vec<AccountId>,
    /// Submission closest to the median, earliest on ties
    pub verifier: AccountId,
    /// SHA-256 over every submission in canonical order
    pub receipt: Attestation,
}

/// Submissions collected for one revealed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub task_id: TaskId,
    /// Submissions in arrival order
    pub submissions: Vec<Submission>,
    pub finalized: bool,
    pub finalized_at: Option<Timestamp>,
    pub final_score: Option<Score>,
    /// Finalized by the owner without consensus
    pub emergency: bool,
    pub slash_candidates: Vec<AccountId>,
    /// Oracles already slashed in connection with this task
    pub slashed: BTreeSet<AccountId>,
}

impl ConsensusRound {
    pub fn new(task_id: TaskId) -> Self {
        ConsensusRound {
            task_id,
            submissions: Vec::new(),
            finalized: false,
            finalized_at: None,
            final_score: None,
            emergency: false,
            slash_candidates: Vec::new(),
            slashed: BTreeSet::new(),
        }
    }

    pub fn has_submitted(&self, oracle: &AccountId) -> bool {
        self.submissions.iter().any(|s| s.oracle == *oracle)
    }

    pub fn first_submission_at(&self) -> Option<Timestamp> {
        self.submissions.first().map(|s| s.submitted_at)
    }

    pub fn scores(&self) -> Vec<Score> {
        self.submissions.iter().map(|s| s.score).collect()
    }

    /// Consensus check over every submission.
    pub fn evaluate(
        &self,
        min_submissions: usize,
        tolerance_bps: u32,
        outlier_multiplier: u32,
    ) -> Option<RoundOutcome> {
        self.evaluate_counted(|_| true, min_submissions, tolerance_bps, outlier_multiplier)
    }

    /// Consensus check over the submissions whose oracle passes `counted`:
    /// at least `min_submissions` of them overall and at least that many
    /// inside the tolerance band around their median. Submissions that are
    /// not counted take no part in the median, the band or the receipt.
    pub fn evaluate_counted(
        &self,
        is_counted: impl Fn(&AccountId) -> bool,
        min_submissions: usize,
        tolerance_bps: u32,
        outlier_multiplier: u32,
    ) -> Option<RoundOutcome> {
        let counted: Vec<&Submission> = self
            .submissions
            .iter()
            .filter(|s| is_counted(&s.oracle))
            .collect();
        if counted.len() < min_submissions {
            return None;
        }
        let scores: Vec<Score> = counted.iter().map(|s| s.score).collect();
        let m2 = median_x2(&scores)?;

        let (in_band, out_of_band): (Vec<&Submission>, Vec<&Submission>) = counted
            .iter()
            .copied()
            .partition(|s| within_band(s.score, m2, tolerance_bps));
        if in_band.len() < min_submissions {
            return None;
        }

        let slash_candidates = counted
            .iter()
            .filter(|s| is_outlier(s.score, m2, tolerance_bps, outlier_multiplier))
            .map(|s| s.oracle.clone())
            .collect();

        // min_by_key keeps the first of equal elements
        let verifier = counted
            .iter()
            .min_by_key(|s| deviation_x2(s.score, m2))
            .map(|s| s.oracle.clone())?;

        Some(RoundOutcome {
            final_score: final_score(m2),
            in_band: in_band.into_iter().map(|s| s.oracle.clone()).collect(),
            out_of_band: out_of_band.into_iter().map(|s| s.oracle.clone()).collect(),
            slash_candidates,
            verifier,
            receipt: self.receipt_of(counted),
        })
    }

    /// Digest of the round, independent of arrival order
    pub fn receipt(&self) -> Attestation {
        self.receipt_of(self.submissions.iter().collect())
    }

    fn receipt_of(&self, mut canonical: Vec<&Submission>) -> Attestation {
        canonical.sort_by(|a, b| a.oracle.cmp(&b.oracle));

        let mut hasher = Sha256::new();
        hasher.update(RECEIPT_DOMAIN);
        hasher.update(self.task_id.to_le_bytes());
        for submission in canonical {
            let oracle = submission.oracle.as_bytes();
            hasher.update((oracle.len() as u32).to_le_bytes());
            hasher.update(oracle);
            hasher.update([submission.score.value()]);
            let attestation = submission.attestation.as_bytes();
            hasher.update((attestation.len() as u32).to_le_bytes());
            hasher.update(attestation);
        }
        Attestation::new(hasher.finalize().to_vec())
    }
}
