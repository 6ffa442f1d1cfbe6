//! Document submission
//!
//! Creates a shared document with zero votes whose bias distribution is the
//! seed estimate for the submitter's metadata.

use crate::bias::{estimate_seed, SeedInput};
use crate::store::DocumentStore;
use newslens_common::events::{EventBus, LensEvent};
use newslens_common::{time, uuid_utils, Document, Error, Result};
use tracing::info;

/// Longest accepted title, in characters
pub const MAX_TITLE_CHARS: usize = 300;

/// What a user provides when submitting a document
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub seed: SeedInput,
}

/// Validate, seed and store a new document
pub async fn create_document<S: DocumentStore + ?Sized>(
    store: &S,
    event_bus: &EventBus,
    submission: NewSubmission,
) -> Result<Document> {
    let title = submission.title.trim();
    if title.is_empty() {
        return Err(Error::Validation("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::Validation(format!(
            "Title longer than {} characters",
            MAX_TITLE_CHARS
        )));
    }

    let seed = estimate_seed(&submission.seed);
    let mut document = Document::new(uuid_utils::generate().to_string(), title, seed);
    document.summary = submission.summary.trim().to_string();
    document.category = submission.category.trim().to_lowercase();

    store.put_document(&document).await?;

    info!(
        document_id = %document.id,
        seed_left = seed.left,
        seed_center = seed.center,
        seed_right = seed.right,
        "Document created"
    );
    event_bus.emit_lossy(LensEvent::DocumentCreated {
        document_id: document.id.clone(),
        seed,
        timestamp: time::now(),
    });

    Ok(document)
}
