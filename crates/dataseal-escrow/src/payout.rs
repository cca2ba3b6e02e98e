use dataseal_types::{Score, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// Shape of the provider's share above the quality floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutShape {
    /// All or nothing
    Threshold,
    /// Share proportional to the score
    Linear,
}

/// Payout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Scores strictly below the floor forfeit the whole pool
    pub quality_floor: Score,
    pub shape: PayoutShape,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        PayoutConfig {
            quality_floor: Score::saturating(50),
            shape: PayoutShape::Threshold,
        }
    }
}

impl PayoutConfig {
    /// Build the policy this configuration describes
    pub fn policy(&self) -> Box<dyn PayoutPolicy> {
        match self.shape {
            PayoutShape::Threshold => Box::new(ThresholdPayout::new(self.quality_floor)),
            PayoutShape::Linear => Box::new(LinearPayout::new(self.quality_floor)),
        }
    }
}

/// Payout policy trait
pub trait PayoutPolicy {
    /// Provider share of the pool in basis points, in `[0, 10_000]`
    fn provider_share_bps(&self, score: Score) -> u32;
}

/// Full release at or above the floor, full forfeiture below it
pub struct ThresholdPayout {
    floor: Score,
}

impl ThresholdPayout {
    pub fn new(floor: Score) -> Self {
        ThresholdPayout { floor }
    }
}

impl PayoutPolicy for ThresholdPayout {
    fn provider_share_bps(&self, score: Score) -> u32 {
        if score < self.floor {
            0
        } else {
            BPS_DENOMINATOR
        }
    }
}

/// Share equal to the score (86 => 86%) at or above the floor
pub struct LinearPayout {
    floor: Score,
}

impl LinearPayout {
    pub fn new(floor: Score) -> Self {
        LinearPayout { floor }
    }
}

impl PayoutPolicy for LinearPayout {
    fn provider_share_bps(&self, score: Score) -> u32 {
        if score < self.floor {
            0
        } else {
            score.value() as u32 * (BPS_DENOMINATOR / 100)
        }
    }
}
