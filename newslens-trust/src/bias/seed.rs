//! Submission seed estimator
//!
//! Initial [`TrustScore`] for a freshly submitted document, before any
//! community votes exist. A submitter's self-declared lean is a weak signal:
//! it can move the seed, never past [`MAX_DOMINANT_SHARE`], and is ignored
//! outright when the source reputation is questionable.

use newslens_common::{BiasClass, Error, Result, TrustScore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Share given to the declared class before reliability scaling
pub const BASE_DOMINANT_SHARE: f64 = 60.0;
/// Hard ceiling for the declared class
pub const MAX_DOMINANT_SHARE: f64 = 80.0;
/// Ceiling for the corroborating-source factor
pub const MAX_SOURCE_FACTOR: f64 = 1.5;
/// Factor gained per source beyond the first
pub const SOURCE_FACTOR_STEP: f64 = 0.1;

/// Seed used when a lean was declared but the source is not trusted
pub const UNTRUSTED_SEED: TrustScore = TrustScore {
    left: 30,
    center: 40,
    right: 30,
};

// remainder split between adjacent and opposite class when leaning left/right
const ADJACENT_WEIGHT: f64 = 25.0;
const OPPOSITE_WEIGHT: f64 = 15.0;

/// Reputation tier of the submitted source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceReputation {
    Verified,
    Questionable,
    #[default]
    Unknown,
}

impl SourceReputation {
    pub fn factor(&self) -> f64 {
        match self {
            SourceReputation::Verified => 1.2,
            SourceReputation::Questionable => 0.8,
            SourceReputation::Unknown => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceReputation::Verified => "verified",
            SourceReputation::Questionable => "questionable",
            SourceReputation::Unknown => "unknown",
        }
    }
}

impl FromStr for SourceReputation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verified" => Ok(SourceReputation::Verified),
            "questionable" => Ok(SourceReputation::Questionable),
            "unknown" | "" => Ok(SourceReputation::Unknown),
            other => Err(Error::Validation(format!("Unknown source reputation: {}", other))),
        }
    }
}

/// Everything the estimator looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedInput {
    /// Submitter's own assessment; `None` when they declared no lean
    pub suggested_bias: Option<BiasClass>,
    pub reputation: SourceReputation,
    /// Number of sources covering the story (0 is treated as 1)
    pub source_count: u32,
}

/// Parse a declared lean where "none" (or empty) means no lean
pub fn parse_lean(value: &str) -> Result<Option<BiasClass>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        other => other.parse().map(Some),
    }
}

/// Factor contributed by corroborating sources: +0.1 per extra source, capped
pub fn source_factor(source_count: u32) -> f64 {
    let extra = source_count.max(1) - 1;
    (1.0 + SOURCE_FACTOR_STEP * f64::from(extra)).min(MAX_SOURCE_FACTOR)
}

/// Reputation and source factors combined multiplicatively
pub fn combined_factor(input: &SeedInput) -> f64 {
    input.reputation.factor() * source_factor(input.source_count)
}

/// Estimate the seed distribution for a document with zero votes
pub fn estimate(input: &SeedInput) -> TrustScore {
    let Some(lean) = input.suggested_bias else {
        return TrustScore::NEUTRAL;
    };

    let factor = combined_factor(input);
    // questionable sources never bias the seed, however many sources they cite
    if input.reputation == SourceReputation::Questionable || factor < 1.0 {
        return UNTRUSTED_SEED;
    }

    let dominant = if factor > 1.0 {
        (BASE_DOMINANT_SHARE * factor).round().min(MAX_DOMINANT_SHARE)
    } else {
        BASE_DOMINANT_SHARE
    };
    let remainder = 100.0 - dominant;

    let mut weights = [0.0f64; 3];
    weights[lean.index()] = dominant;
    match lean {
        BiasClass::Center => {
            weights[BiasClass::Left.index()] = remainder / 2.0;
            weights[BiasClass::Right.index()] = remainder / 2.0;
        }
        BiasClass::Left | BiasClass::Right => {
            let opposite = if lean == BiasClass::Left {
                BiasClass::Right
            } else {
                BiasClass::Left
            };
            let total = ADJACENT_WEIGHT + OPPOSITE_WEIGHT;
            weights[BiasClass::Center.index()] = remainder * ADJACENT_WEIGHT / total;
            weights[opposite.index()] = remainder * OPPOSITE_WEIGHT / total;
        }
    }

    TrustScore::from_weights(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(lean: Option<BiasClass>, reputation: SourceReputation, sources: u32) -> SeedInput {
        SeedInput {
            suggested_bias: lean,
            reputation,
            source_count: sources,
        }
    }

    #[test]
    fn test_no_lean_is_neutral() {
        for reputation in [
            SourceReputation::Verified,
            SourceReputation::Questionable,
            SourceReputation::Unknown,
        ] {
            assert_eq!(estimate(&input(None, reputation, 4)), TrustScore::NEUTRAL);
        }
    }

    #[test]
    fn test_base_declared_lean() {
        let unknown = SourceReputation::Unknown;
        assert_eq!(
            estimate(&input(Some(BiasClass::Left), unknown, 1)),
            TrustScore { left: 60, center: 25, right: 15 }
        );
        assert_eq!(
            estimate(&input(Some(BiasClass::Right), unknown, 1)),
            TrustScore { left: 15, center: 25, right: 60 }
        );
        assert_eq!(
            estimate(&input(Some(BiasClass::Center), unknown, 0)),
            TrustScore { left: 20, center: 60, right: 20 }
        );
    }

    #[test]
    fn test_verified_with_three_sources_caps_at_80() {
        // 1.2 * 1.2 = 1.44 -> 86.4, capped at 80
        let seed = estimate(&input(Some(BiasClass::Left), SourceReputation::Verified, 3));
        assert_eq!(seed, TrustScore { left: 80, center: 13, right: 7 });
        assert!(seed.center > seed.right);
    }

    #[test]
    fn test_moderate_boost_below_cap() {
        // unknown with 2 sources: factor 1.1 -> 66
        let seed = estimate(&input(Some(BiasClass::Right), SourceReputation::Unknown, 2));
        assert_eq!(seed.right, 66);
        assert_eq!(seed.total(), 100);
        assert!(seed.center > seed.left);
    }

    #[test]
    fn test_questionable_discards_lean() {
        let seed = estimate(&input(Some(BiasClass::Left), SourceReputation::Questionable, 1));
        assert_eq!(seed, UNTRUSTED_SEED);

        // many sources push the combined factor above 1, still not trusted
        let seed = estimate(&input(Some(BiasClass::Left), SourceReputation::Questionable, 6));
        assert_eq!(seed, UNTRUSTED_SEED);
    }

    #[test]
    fn test_source_factor_steps_and_cap() {
        assert_eq!(source_factor(0), 1.0);
        assert_eq!(source_factor(1), 1.0);
        assert!((source_factor(3) - 1.2).abs() < 1e-12);
        assert_eq!(source_factor(6), 1.5);
        assert_eq!(source_factor(50), 1.5);
    }

    #[test]
    fn test_parse_inputs() {
        assert_eq!(parse_lean("none").unwrap(), None);
        assert_eq!(parse_lean("Right").unwrap(), Some(BiasClass::Right));
        assert!(parse_lean("north").is_err());
        assert_eq!("VERIFIED".parse::<SourceReputation>().unwrap(), SourceReputation::Verified);
        assert!("shady".parse::<SourceReputation>().is_err());
    }
}
