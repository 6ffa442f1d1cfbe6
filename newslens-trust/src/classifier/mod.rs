//! Zero-shot bias classifier client
//!
//! Sends article text to a zero-shot classification endpoint with the fixed
//! candidate labels `left`, `center`, `right` and hands the raw
//! `{labels, scores}` answer to the bias normalizer.
//!
//! A model that is still loading (503/524, or an error body saying so) gets
//! exactly one retry after the configured delay. Nothing else is retried.

use crate::bias::{BiasAssessment, ClassifierResult};
use newslens_common::config::ClassifierConfig;
use newslens_common::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "newslens/0.1.0";

/// Candidate labels sent with every request
pub const CANDIDATE_LABELS: [&str; 3] = ["left", "center", "right"];

/// Classifier client errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Nothing to classify after trimming
    #[error("Text to classify is empty")]
    EmptyInput,

    /// Connection, timeout or TLS failure
    #[error("Network error: {0}")]
    Network(String),

    /// Model still loading after the retry
    #[error("Classifier unavailable ({0}): {1}")]
    Unavailable(u16, String),

    /// Request refused (bad token, bad payload)
    #[error("Classifier rejected request ({0}): {1}")]
    Rejected(u16, String),

    /// Any other server-side failure
    #[error("Classifier server error ({0}): {1}")]
    Server(u16, String),

    /// Response body was not a label/score answer
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClassifierError {
    fn is_model_loading(&self) -> bool {
        matches!(self, ClassifierError::Unavailable(..))
    }
}

impl From<ClassifierError> for Error {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::EmptyInput => Error::Validation(err.to_string()),
            ClassifierError::Network(_)
            | ClassifierError::Unavailable(..)
            | ClassifierError::Server(..) => Error::Transient(err.to_string()),
            ClassifierError::Rejected(..) => Error::Conflict(err.to_string()),
            ClassifierError::Parse(_) => Error::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
    parameters: ClassifyParameters,
}

#[derive(Debug, Serialize)]
struct ClassifyParameters {
    candidate_labels: [&'static str; 3],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the classification endpoint
pub struct ClassifierClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    max_text_chars: usize,
    retry_delay: Duration,
}

impl ClassifierClient {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            max_text_chars: config.max_text_chars,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Classify `text` and normalize the answer
    pub async fn classify(&self, text: &str) -> newslens_common::Result<BiasAssessment> {
        Ok(self.classify_raw(text).await?.into_assessment())
    }

    /// Classify `text`, returning the raw label/score answer
    pub async fn classify_raw(&self, text: &str) -> Result<ClassifierResult, ClassifierError> {
        let input = prepare_input(text, self.max_text_chars)?;

        match self.request(&input).await {
            Err(e) if e.is_model_loading() => {
                tracing::warn!(
                    retry_delay_ms = self.retry_delay.as_millis() as u64,
                    error = %e,
                    "Classifier model loading, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;
                self.request(&input).await
            }
            other => other,
        }
    }

    async fn request(&self, input: &str) -> Result<ClassifierResult, ClassifierError> {
        let body = ClassifyRequest {
            inputs: input,
            parameters: ClassifyParameters {
                candidate_labels: CANDIDATE_LABELS,
            },
        };

        tracing::debug!(endpoint = %self.endpoint, chars = input.chars().count(), "Querying classifier");

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }

        let parsed: ClassifyResponse = serde_json::from_str(&text)
            .map_err(|e| ClassifierError::Parse(format!("Unexpected classifier response: {}", e)))?;

        if parsed.labels.len() != parsed.scores.len() {
            return Err(ClassifierError::Parse(format!(
                "{} labels but {} scores",
                parsed.labels.len(),
                parsed.scores.len()
            )));
        }

        tracing::debug!(labels = ?parsed.labels, scores = ?parsed.scores, "Classifier answered");

        Ok(ClassifierResult {
            labels: parsed.labels,
            scores: parsed.scores,
        })
    }
}

/// Trim and truncate to at most `max_chars` characters
pub fn prepare_input(text: &str, max_chars: usize) -> Result<String, ClassifierError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ClassifierError::EmptyInput);
    }
    Ok(trimmed.chars().take(max_chars).collect())
}

fn classify_failure(status: u16, body: &str) -> ClassifierError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string());

    if status == 503 || status == 524 || message.to_lowercase().contains("loading") {
        ClassifierError::Unavailable(status, message)
    } else if (400..500).contains(&status) {
        ClassifierError::Rejected(status, message)
    } else {
        ClassifierError::Server(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_input_trims_and_truncates() {
        assert_eq!(prepare_input("  hello  ", 3000).unwrap(), "hello");
        assert_eq!(prepare_input("abcdef", 4).unwrap(), "abcd");
        // truncation counts characters, not bytes
        assert_eq!(prepare_input("ééééé", 2).unwrap(), "éé");
        assert!(matches!(prepare_input("   ", 10), Err(ClassifierError::EmptyInput)));
    }

    #[test]
    fn test_failure_classification() {
        assert!(classify_failure(503, "").is_model_loading());
        assert!(classify_failure(524, "timeout").is_model_loading());
        assert!(classify_failure(500, r#"{"error":"Model is currently loading"}"#).is_model_loading());
        assert!(matches!(classify_failure(401, "{}"), ClassifierError::Rejected(401, _)));
        assert!(matches!(classify_failure(502, "bad gateway"), ClassifierError::Server(502, _)));
    }

    #[test]
    fn test_error_taxonomy() {
        assert!(Error::from(ClassifierError::EmptyInput).is_validation());
        assert!(Error::from(ClassifierError::Unavailable(503, "x".into())).is_transient());
        assert!(Error::from(ClassifierError::Network("x".into())).is_transient());
        assert!(Error::from(ClassifierError::Rejected(403, "x".into())).is_conflict());
    }
}
