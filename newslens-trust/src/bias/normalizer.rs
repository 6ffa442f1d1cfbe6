//! Bias normalizer
//!
//! Turns a classifier's raw per-class scores into a [`TrustScore`] plus the
//! dominant class and its raw confidence. Pure; assumes well-formed input.

use newslens_common::{BiasClass, TrustScore};
use serde::{Deserialize, Serialize};

/// Raw zero-shot classification output: parallel label and score arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResult {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

/// Normalized classifier verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasAssessment {
    pub score: TrustScore,
    pub dominant: BiasClass,
    /// Raw (pre-normalization) score of the dominant class
    pub confidence: f64,
}

/// Normalize parallel label/score arrays
///
/// Labels are matched case-insensitively; unknown labels are ignored and
/// missing classes count as 0. A label repeated later overwrites the earlier
/// score. Extra labels or scores without a partner are dropped.
pub fn normalize(labels: &[String], scores: &[f64]) -> BiasAssessment {
    let mut raw = [0.0f64; 3];
    for (label, &score) in labels.iter().zip(scores.iter()) {
        if let Ok(class) = label.parse::<BiasClass>() {
            raw[class.index()] = if score.is_finite() && score > 0.0 { score } else { 0.0 };
        }
    }

    let dominant = BiasClass::dominant_of(raw);
    BiasAssessment {
        score: TrustScore::from_weights(raw),
        dominant,
        confidence: raw[dominant.index()],
    }
}

impl ClassifierResult {
    /// Consume the raw result, keeping only the normalized verdict
    pub fn into_assessment(self) -> BiasAssessment {
        normalize(&self.labels, &self.scores)
    }
}

/// Map a signed lean in [-1, 1] (negative = left) to a distribution
///
/// Leans within ±0.1 read as neutral `{30,40,30}`. Otherwise the leaning side
/// gets `30 + 40·s`, the opposite side `10 + 20·(1−s)` and the center the rest,
/// where `s` is the lean strength clamped to 1.
pub fn lean_to_score(lean: f64) -> TrustScore {
    if !lean.is_finite() || lean.abs() <= 0.1 {
        return TrustScore {
            left: 30,
            center: 40,
            right: 30,
        };
    }

    let strength = lean.abs().min(1.0);
    let leaning = (30.0 + strength * 40.0).round() as u8;
    let opposite = (10.0 + (1.0 - strength) * 20.0).round() as u8;
    let center = 100 - leaning - opposite;

    if lean < 0.0 {
        TrustScore {
            left: leaning,
            center,
            right: opposite,
        }
    } else {
        TrustScore {
            left: opposite,
            center,
            right: leaning,
        }
    }
}

/// Human-readable label for a signed lean, snapped to the nearest 0.2 step
pub fn lean_label(lean: f64) -> &'static str {
    const LABELS: [(f64, &str); 11] = [
        (-1.0, "Strong Left Bias"),
        (-0.8, "Strong Left Bias"),
        (-0.6, "Moderate Left Bias"),
        (-0.4, "Moderate Left Bias"),
        (-0.2, "Slight Left Bias"),
        (0.0, "Center/Neutral"),
        (0.2, "Slight Right Bias"),
        (0.4, "Moderate Right Bias"),
        (0.6, "Moderate Right Bias"),
        (0.8, "Strong Right Bias"),
        (1.0, "Strong Right Bias"),
    ];

    let lean = if lean.is_finite() { lean } else { 0.0 };
    let mut best = LABELS[0];
    for candidate in LABELS.iter().skip(1) {
        // strict comparison: an exact midpoint keeps the more-left label
        if (lean - candidate.0).abs() < (lean - best.0).abs() {
            best = *candidate;
        }
    }
    best.1
}

/// Class implied by a signed lean
pub fn lean_class(lean: f64) -> BiasClass {
    if lean < -0.1 {
        BiasClass::Left
    } else if lean > 0.1 {
        BiasClass::Right
    } else {
        BiasClass::Center
    }
}
