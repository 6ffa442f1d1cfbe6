//! Statistics recomputation
//!
//! Always from the full vote set of one document, never from deltas.

use newslens_common::{DocumentTrustStats, TrustScore, Vote};

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive a document's trust statistics from all of its current votes
pub fn recompute(votes: &[Vote]) -> DocumentTrustStats {
    if votes.is_empty() {
        return DocumentTrustStats::default();
    }

    let mut counts = [0.0f64; 3];
    let mut credibility = 0u64;
    let mut quality = 0u64;
    for vote in votes {
        counts[vote.bias.index()] += 1.0;
        credibility += u64::from(vote.credibility);
        quality += u64::from(vote.quality);
    }

    let total = votes.len() as f64;
    DocumentTrustStats {
        total_votes: votes.len() as u32,
        bias_score: TrustScore::from_weights(counts),
        average_credibility: round2(credibility as f64 / total),
        average_quality: round2(quality as f64 / total),
    }
}
