//! Completion service boundary
//!
//! Everything the client needs from the remote service goes through
//! [`ServiceApi`], so the session can be driven against a mock in tests.

mod error;
mod http;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{ApiError, ApiErrorKind, SERVICE_UNAVAILABLE};
pub use http::HttpServiceApi;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Calls exposed by the completion/search/ingestion service
#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// Probe `/health`
    async fn health(&self) -> Result<HealthReport, ApiError>;

    /// Conversation starters shown before a session begins
    async fn suggestions(&self) -> Result<Vec<String>, ApiError>;

    /// Single completion attempt against the endpoint selected by `mode`
    async fn complete(
        &self,
        mode: CompletionMode,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError>;

    /// Upload raw document bytes
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ApiError>;

    /// Ask the service to ingest a previously uploaded file
    async fn ingest(&self, file_id: &str) -> Result<(), ApiError>;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;

    /// Address requests are currently sent to
    fn base_url(&self) -> String;

    /// Point subsequent requests at a different address
    fn set_base_url(&self, base_url: &str);
}

/// Logging wrapper for service calls
pub struct LoggingApi {
    inner: Arc<dyn ServiceApi>,
}

impl LoggingApi {
    pub fn new(inner: Arc<dyn ServiceApi>) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(call: &'static str, started: Instant, result: &Result<T, ApiError>) {
    let duration = started.elapsed();
    match result {
        Ok(_) => {
            tracing::debug!(
                call,
                duration_ms = %duration.as_millis(),
                "Service call completed"
            );
        }
        Err(e) => {
            tracing::warn!(
                call,
                duration_ms = %duration.as_millis(),
                status = ?e.status,
                error = %e.message,
                retryable = e.is_retryable(),
                "Service call failed"
            );
        }
    }
}

#[async_trait]
impl ServiceApi for LoggingApi {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        let started = Instant::now();
        let result = self.inner.health().await;
        log_outcome("health", started, &result);
        result
    }

    async fn suggestions(&self) -> Result<Vec<String>, ApiError> {
        let started = Instant::now();
        let result = self.inner.suggestions().await;
        log_outcome("suggestions", started, &result);
        result
    }

    async fn complete(
        &self,
        mode: CompletionMode,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError> {
        let started = Instant::now();
        tracing::debug!(
            mode = ?mode,
            messages = request.messages.len(),
            "Sending completion request"
        );
        let result = self.inner.complete(mode, request).await;
        if result.is_ok() {
            tracing::info!(
                mode = ?mode,
                duration_ms = %started.elapsed().as_millis(),
                "Completion received"
            );
        } else {
            log_outcome("complete", started, &result);
        }
        result
    }

    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ApiError> {
        let started = Instant::now();
        let result = self.inner.upload(file_name, mime_type, bytes).await;
        log_outcome("upload", started, &result);
        result
    }

    async fn ingest(&self, file_id: &str) -> Result<(), ApiError> {
        let started = Instant::now();
        let result = self.inner.ingest(file_id).await;
        log_outcome("ingest", started, &result);
        result
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let started = Instant::now();
        let result = self.inner.search(query).await;
        log_outcome("search", started, &result);
        result
    }

    fn base_url(&self) -> String {
        self.inner.base_url()
    }

    fn set_base_url(&self, base_url: &str) {
        self.inner.set_base_url(base_url);
    }
}
