//! Median and tolerance arithmetic in half-units.
//!
//! The median of an even-sized multiset can fall on a half point (85 and 86
//! give 85.5), so everything here works with `m2 = 2 * median` and `2 * score`.
//! All comparisons are exact integer comparisons.

use dataseal_types::{Score, BPS_DENOMINATOR};

/// Twice the median of `scores`; `None` for an empty slice
pub fn median_x2(scores: &[Score]) -> Option<u32> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted: Vec<u32> = scores.iter().map(|s| s.value() as u32).collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid] * 2
    } else {
        sorted[mid - 1] + sorted[mid]
    })
}

/// `|2 * score - m2|`
pub fn deviation_x2(score: Score, m2: u32) -> u32 {
    (score.value() as u32 * 2).abs_diff(m2)
}

/// Within `median * tolerance_bps / 10_000` of the median, boundary inclusive
pub fn within_band(score: Score, m2: u32, tolerance_bps: u32) -> bool {
    deviation_x2(score, m2) as u64 * BPS_DENOMINATOR as u64 <= m2 as u64 * tolerance_bps as u64
}

/// Further than `multiplier` times the tolerance band from the median
pub fn is_outlier(score: Score, m2: u32, tolerance_bps: u32, multiplier: u32) -> bool {
    deviation_x2(score, m2) as u64 * BPS_DENOMINATOR as u64
        > m2 as u64 * tolerance_bps as u64 * multiplier as u64
}

/// Final score from a half-unit median, rounding half up
pub fn final_score(m2: u32) -> Score {
    Score::saturating(((m2 + 1) / 2).min(u8::MAX as u32) as u8)
}
