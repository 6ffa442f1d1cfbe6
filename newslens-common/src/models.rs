//! Shared data model
//!
//! Types that cross the boundary between the trust engine, the stores and
//! anything reading a document's trust statistics.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted credibility/quality rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted credibility/quality rating
pub const MAX_RATING: u8 = 5;

/// Political lean category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasClass {
    Left,
    Center,
    Right,
}

impl BiasClass {
    /// All classes in distribution order (left, center, right)
    pub const ALL: [BiasClass; 3] = [BiasClass::Left, BiasClass::Center, BiasClass::Right];

    /// Tie-break order: center wins over left, left over right
    pub const PRIORITY: [BiasClass; 3] = [BiasClass::Center, BiasClass::Left, BiasClass::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            BiasClass::Left => "left",
            BiasClass::Center => "center",
            BiasClass::Right => "right",
        }
    }

    /// Position in a `[left, center, right]` array
    pub fn index(&self) -> usize {
        match self {
            BiasClass::Left => 0,
            BiasClass::Center => 1,
            BiasClass::Right => 2,
        }
    }

    /// Pick the class with the highest weight, ties resolved by [`BiasClass::PRIORITY`]
    pub fn dominant_of(weights: [f64; 3]) -> BiasClass {
        let mut best = BiasClass::PRIORITY[0];
        for class in BiasClass::PRIORITY.iter().skip(1) {
            if weights[class.index()] > weights[best.index()] {
                best = *class;
            }
        }
        best
    }
}

impl fmt::Display for BiasClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(BiasClass::Left),
            "center" | "centre" => Ok(BiasClass::Center),
            "right" => Ok(BiasClass::Right),
            other => Err(Error::Validation(format!("Unknown bias class: {}", other))),
        }
    }
}

/// Three-way percentage distribution over left/center/right
///
/// Always sums to exactly 100. Build one through [`TrustScore::from_weights`]
/// or [`TrustScore::new`] so the invariant holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustScore {
    pub left: u8,
    pub center: u8,
    pub right: u8,
}

impl TrustScore {
    /// Distribution used when no signal exists
    pub const NEUTRAL: TrustScore = TrustScore {
        left: 33,
        center: 34,
        right: 33,
    };

    /// Build from explicit percentages, rejecting anything not summing to 100
    pub fn new(left: u8, center: u8, right: u8) -> Result<Self> {
        let total = u32::from(left) + u32::from(center) + u32::from(right);
        if total != 100 {
            return Err(Error::Validation(format!(
                "Trust score must sum to 100, got {} ({}/{}/{})",
                total, left, center, right
            )));
        }
        Ok(Self { left, center, right })
    }

    /// Convert non-negative weights (left, center, right) to whole percentages
    ///
    /// Largest-remainder rounding: every share is floored, then the missing
    /// points go to the largest fractional parts, ties by class priority.
    /// Negative or non-finite weights count as zero; an all-zero input
    /// yields [`TrustScore::NEUTRAL`].
    pub fn from_weights(weights: [f64; 3]) -> Self {
        let weights = weights.map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 });
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Self::NEUTRAL;
        }

        let exact = weights.map(|w| w * 100.0 / total);
        let mut shares = exact.map(|e| e.floor().clamp(0.0, 100.0) as u32);
        let assigned: u32 = shares.iter().sum();
        let leftover = 100u32.saturating_sub(assigned) as usize;

        // remainders quantized to micro-points so float noise cannot break ties
        let remainder = exact.map(|e| ((e - e.floor()) * 1_000_000.0).round() as i64);
        let mut order = BiasClass::PRIORITY.map(|c| c.index());
        // stable sort keeps priority order among equal remainders
        order.sort_by(|&a, &b| remainder[b].cmp(&remainder[a]));
        for &idx in order.iter().cycle().take(leftover) {
            shares[idx] += 1;
        }

        Self {
            left: shares[0] as u8,
            center: shares[1] as u8,
            right: shares[2] as u8,
        }
    }

    /// Share for one class
    pub fn share(&self, class: BiasClass) -> u8 {
        match class {
            BiasClass::Left => self.left,
            BiasClass::Center => self.center,
            BiasClass::Right => self.right,
        }
    }

    /// Shares in `[left, center, right]` order
    pub fn as_array(&self) -> [u8; 3] {
        [self.left, self.center, self.right]
    }

    /// Class with the largest share (ties: center, then left, then right)
    pub fn dominant(&self) -> BiasClass {
        BiasClass::dominant_of(self.as_array().map(f64::from))
    }

    pub fn total(&self) -> u32 {
        self.as_array().iter().map(|&v| u32::from(v)).sum()
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// One user's opinion about one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub user_id: String,
    pub document_id: String,
    pub bias: BiasClass,
    pub credibility: u8,
    pub quality: u8,
    pub voted_at: DateTime<Utc>,
}

/// Values a user submits when voting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInput {
    pub bias: BiasClass,
    pub credibility: u8,
    pub quality: u8,
}

impl VoteInput {
    /// Reject ratings outside 1-5
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("credibility", self.credibility), ("quality", self.quality)] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(Error::Validation(format!(
                    "{} rating must be between {} and {}, got {}",
                    name, MIN_RATING, MAX_RATING, value
                )));
            }
        }
        Ok(())
    }
}

/// Denormalized trust statistics stored on a document
///
/// Written only by the vote aggregation engine, always recomputed from the
/// full vote set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTrustStats {
    pub total_votes: u32,
    pub bias_score: TrustScore,
    pub average_credibility: f64,
    pub average_quality: f64,
}

impl DocumentTrustStats {
    /// Statistics of a document with no votes, optionally carrying a seed distribution
    pub fn seeded(bias_score: TrustScore) -> Self {
        Self {
            total_votes: 0,
            bias_score,
            average_credibility: 0.0,
            average_quality: 0.0,
        }
    }
}

impl Default for DocumentTrustStats {
    fn default() -> Self {
        Self::seeded(TrustScore::NEUTRAL)
    }
}

/// Shared news document carrying its trust statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub stats: DocumentTrustStats,
    pub bookmark_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// New document with no votes and the given seed distribution
    pub fn new(id: impl Into<String>, title: impl Into<String>, seed: TrustScore) -> Self {
        let now = crate::time::now();
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            category: String::new(),
            stats: DocumentTrustStats::seeded(seed),
            bookmark_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_weights_two_to_one() {
        let score = TrustScore::from_weights([2.0, 0.0, 1.0]);
        assert_eq!(score, TrustScore { left: 67, center: 0, right: 33 });
    }

    #[test]
    fn test_from_weights_even_split_gives_neutral() {
        assert_eq!(TrustScore::from_weights([1.0, 1.0, 1.0]), TrustScore::NEUTRAL);
    }

    #[test]
    fn test_from_weights_zero_total() {
        assert_eq!(TrustScore::from_weights([0.0, 0.0, 0.0]), TrustScore::NEUTRAL);
        assert_eq!(TrustScore::from_weights([-1.0, f64::NAN, 0.0]), TrustScore::NEUTRAL);
    }

    #[test]
    fn test_from_weights_remainder_tie_prefers_center_then_left() {
        // 1/6 each side of a 2/3 middle: 16.67 / 66.67 / 16.67 -> floors 16/66/16
        let score = TrustScore::from_weights([1.0, 4.0, 1.0]);
        assert_eq!(score.total(), 100);
        assert_eq!(score, TrustScore { left: 17, center: 67, right: 16 });
    }

    #[test]
    fn test_new_rejects_bad_total() {
        assert!(TrustScore::new(50, 50, 1).is_err());
        assert!(TrustScore::new(60, 25, 15).is_ok());
    }

    #[test]
    fn test_dominant_ties() {
        assert_eq!(TrustScore::NEUTRAL.dominant(), BiasClass::Center);
        assert_eq!(TrustScore { left: 40, center: 20, right: 40 }.dominant(), BiasClass::Left);
        assert_eq!(TrustScore { left: 10, center: 45, right: 45 }.dominant(), BiasClass::Center);
        assert_eq!(TrustScore { left: 10, center: 30, right: 60 }.dominant(), BiasClass::Right);
    }

    #[test]
    fn test_bias_class_parse() {
        assert_eq!("Left".parse::<BiasClass>().unwrap(), BiasClass::Left);
        assert_eq!(" center ".parse::<BiasClass>().unwrap(), BiasClass::Center);
        assert!("up".parse::<BiasClass>().unwrap_err().is_validation());
    }

    #[test]
    fn test_vote_input_validation() {
        let ok = VoteInput { bias: BiasClass::Left, credibility: 1, quality: 5 };
        assert!(ok.validate().is_ok());

        let low = VoteInput { credibility: 0, ..ok };
        assert!(low.validate().unwrap_err().is_validation());

        let high = VoteInput { quality: 6, ..ok };
        assert!(high.validate().unwrap_err().is_validation());
    }

    proptest! {
        #[test]
        fn prop_from_weights_always_sums_to_100(
            left in 0.0f64..1000.0,
            center in 0.0f64..1000.0,
            right in 0.0f64..1000.0,
        ) {
            let score = TrustScore::from_weights([left, center, right]);
            prop_assert_eq!(score.total(), 100);
        }
    }
}
