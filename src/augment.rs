//! Conversation augmentation
//!
//! Two pipelines feed extra context into the conversation: documents that
//! the service ingests for retrieval, and web search results that are
//! injected as assistant entries ahead of a completion.

mod files;
mod search;

pub use files::{classify, DocumentKind, FileIngestor, FileOutcome, FileUpload, FileValidationError};
pub use search::{format_results, placeholder_text, SearchOutcome, WebSearcher};

use crate::api::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AugmentError {
    #[error(transparent)]
    Validation(#[from] FileValidationError),
    #[error("upload failed: {0}")]
    Upload(ApiError),
    #[error("processing failed: {0}")]
    Ingest(ApiError),
    #[error("search failed: {0}")]
    Search(ApiError),
}
