//! Vote aggregation engine
//!
//! The only writer of a document's trust statistics. Every mutation goes
//! through [`VoteStore::commit`], which recomputes the statistics from the
//! full vote set inside the same atomic unit as the vote change. Failures are
//! returned to the caller as-is; a vote is never dropped silently.

use super::stats::recompute;
use crate::store::{VoteChange, VoteStore};
use newslens_common::events::{EventBus, LensEvent};
use newslens_common::{time, DocumentTrustStats, Error, Result, Vote, VoteInput};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of recent votes considered by [`VoteEngine::user_accuracy`]
pub const ACCURACY_WINDOW: usize = 50;

/// Document statistics together with the caller's own vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingSummary {
    pub stats: DocumentTrustStats,
    pub user_vote: Option<Vote>,
}

/// Vote count of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub user_id: String,
    pub vote_count: usize,
}

/// Vote aggregation engine
pub struct VoteEngine<S: ?Sized> {
    store: Arc<S>,
    event_bus: EventBus,
}

impl<S: VoteStore + ?Sized> VoteEngine<S> {
    pub fn new(store: Arc<S>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Insert or replace the caller's vote and return the recomputed statistics
    ///
    /// Resolves once the vote and the statistics are durable. Ratings outside
    /// 1-5 are rejected before the store is touched.
    pub async fn submit_vote(
        &self,
        user_id: &str,
        document_id: &str,
        input: VoteInput,
    ) -> Result<DocumentTrustStats> {
        require_id("user id", user_id)?;
        require_id("document id", document_id)?;
        input.validate()?;

        let change = VoteChange::Upsert {
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
            input,
            voted_at: time::now(),
        };

        let commit = self.store.commit(change, recompute).await?.ok_or_else(|| {
            Error::Internal(format!("Vote upsert on {} produced no commit", document_id))
        })?;

        info!(
            user_id,
            document_id,
            replaced = commit.replaced,
            total_votes = commit.stats.total_votes,
            "Vote committed"
        );

        self.event_bus.emit_lossy(LensEvent::VoteCommitted {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            stats: commit.stats.clone(),
            timestamp: time::now(),
        });

        Ok(commit.stats)
    }

    /// Remove the caller's vote
    ///
    /// Returns `Ok(None)` when the user had not voted; nothing is written then.
    pub async fn retract_vote(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<DocumentTrustStats>> {
        require_id("user id", user_id)?;
        require_id("document id", document_id)?;

        let change = VoteChange::Retract {
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
        };

        let Some(commit) = self.store.commit(change, recompute).await? else {
            debug!(user_id, document_id, "No vote to retract");
            return Ok(None);
        };

        info!(
            user_id,
            document_id,
            total_votes = commit.stats.total_votes,
            "Vote retracted"
        );

        self.event_bus.emit_lossy(LensEvent::VoteRetracted {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            stats: commit.stats.clone(),
            timestamp: time::now(),
        });

        Ok(Some(commit.stats))
    }

    /// Statistics recomputed from the document's current votes
    pub async fn get_stats(&self, document_id: &str) -> Result<DocumentTrustStats> {
        let votes = self.store.votes_for_document(document_id).await?;
        Ok(recompute(&votes))
    }

    /// Statistics plus the given user's vote on the document, if any
    pub async fn voting_summary(&self, document_id: &str, user_id: &str) -> Result<VotingSummary> {
        let votes = self.store.votes_for_document(document_id).await?;
        let user_vote = votes.iter().find(|v| v.user_id == user_id).cloned();
        Ok(VotingSummary {
            stats: recompute(&votes),
            user_vote,
        })
    }

    /// The user's most recent votes, newest first
    pub async fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<Vote>> {
        self.store.votes_by_user(user_id, limit).await
    }

    /// Users with the most votes, ties broken by user id
    pub async fn top_contributors(&self, limit: usize) -> Result<Vec<Contributor>> {
        let votes = self.store.all_votes().await?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for vote in votes {
            *counts.entry(vote.user_id).or_default() += 1;
        }

        let mut contributors: Vec<Contributor> = counts
            .into_iter()
            .map(|(user_id, vote_count)| Contributor {
                user_id,
                vote_count,
            })
            .collect();
        contributors.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        contributors.truncate(limit);
        Ok(contributors)
    }

    /// How closely a user's recent votes agree with the community, 0-100
    ///
    /// Per vote: `(bias_match + credibility_accuracy) / 2` where `bias_match`
    /// is 1 when the vote names the document's dominant class and 0.5
    /// otherwise, and `credibility_accuracy = 1 - |vote - average| / 4`.
    /// A user without votes scores 0. The mean is returned unrounded.
    pub async fn user_accuracy(&self, user_id: &str) -> Result<f64> {
        let votes = self.store.votes_by_user(user_id, ACCURACY_WINDOW).await?;
        if votes.is_empty() {
            return Ok(0.0);
        }

        let mut sum = 0.0;
        for vote in &votes {
            let stats = self.get_stats(&vote.document_id).await?;
            let bias_match = if vote.bias == stats.bias_score.dominant() {
                1.0
            } else {
                0.5
            };
            let credibility_accuracy =
                1.0 - (f64::from(vote.credibility) - stats.average_credibility).abs() / 4.0;
            sum += (bias_match + credibility_accuracy) / 2.0;
        }

        Ok(sum / votes.len() as f64 * 100.0)
    }
}

fn require_id(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}
