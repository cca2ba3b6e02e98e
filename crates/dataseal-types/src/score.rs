use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DataSealError, Result};

/// Quality score in the closed range [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(100);

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX.0 {
            return Err(DataSealError::InvalidScore(value as i64));
        }
        Ok(Score(value))
    }

    /// Clamp to the valid range
    pub const fn saturating(value: u8) -> Self {
        if value > Self::MAX.0 {
            Self::MAX
        } else {
            Score(value)
        }
    }

    /// Accepts wider integers from untyped callers (API, config)
    pub fn from_i64(value: i64) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| DataSealError::InvalidScore(value))
            .and_then(Score::new)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = DataSealError;

    fn try_from(value: u8) -> Result<Self> {
        Score::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
