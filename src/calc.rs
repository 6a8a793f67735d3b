use serde::{Serialize, Serializer};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLabelError {
    #[error("unknown term: {0}")]
    Term(String),
    #[error("unknown test slot: {0}")]
    TestSlot(String),
    #[error("unknown fee status: {0}")]
    FeeState(String),
    #[error("unknown gender: {0}")]
    Gender(String),
}

/// Placeholder shown when a pupil has no position in a ranking.
pub const RANK_ABSENT: &str = "—";
/// Placeholder shown on test sheets for pupils with nothing recorded.
pub const RANK_NOT_APPLICABLE: &str = "N/A";

/// The single place where an absent test score becomes a number.
///
/// A pupil who sat only one of the two term tests is scored as if they
/// scored 0 on the other; the record is never excluded.
pub fn score_or_zero(score: Option<f64>) -> f64 {
    score.unwrap_or(0.0)
}

/// Whole-number rounding for display means and total marks.
/// Half values round away from zero (`44.5 -> 45`).
pub fn round_half_up(x: f64) -> f64 {
    x.round()
}

/// 1-decimal rounding used for percentages: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// `value / denominator * 100`, or 0 when the denominator is not positive.
pub fn percentage_of(value: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        (value / denominator) * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Position(u32),
    Absent,
    NotApplicable,
}

impl Rank {
    pub fn position(self) -> Option<u32> {
        match self {
            Rank::Position(p) => Some(p),
            _ => None,
        }
    }

    fn sort_key(self) -> u32 {
        self.position().unwrap_or(u32::MAX)
    }

    pub fn cmp_for_listing(self, other: Rank) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rank::Position(p) => serializer.serialize_u32(*p),
            Rank::Absent => serializer.serialize_str(RANK_ABSENT),
            Rank::NotApplicable => serializer.serialize_str(RANK_NOT_APPLICABLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<K> {
    pub key: K,
    pub value: f64,
    pub rank: u32,
}

/// Values closer than this are the same value for ranking purposes.
const RANK_SCALE: f64 = 1e6;

/// Fixed-point key for comparing summed grades. Sums of the same decimal
/// grades taken in different orders can differ in the last bit.
fn rank_key(value: f64) -> i64 {
    (value * RANK_SCALE).round() as i64
}

/// Standard competition ranking ("1224"), highest value first.
///
/// Equal values share the rank of the first entry holding that value; the
/// next distinct value gets its 1-based position in the sorted sequence.
/// Values are compared at micro-unit precision. Entries with equal values
/// are listed by key so repeated runs agree.
pub fn competition_rank<K: Ord>(entries: Vec<(K, f64)>) -> Vec<RankedEntry<K>> {
    let mut sorted: Vec<(i64, K, f64)> = entries
        .into_iter()
        .map(|(key, value)| (rank_key(value), key, value))
        .collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut out: Vec<RankedEntry<K>> = Vec::with_capacity(sorted.len());
    let mut prev: Option<(i64, u32)> = None;
    for (i, (cmp_key, key, value)) in sorted.into_iter().enumerate() {
        let rank = match prev {
            Some((k, r)) if k == cmp_key => r,
            _ => (i as u32) + 1,
        };
        prev = Some((cmp_key, rank));
        out.push(RankedEntry { key, value, rank });
    }
    out
}
