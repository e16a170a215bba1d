//! Mock service for testing
//!
//! Responses are queued per call type and popped in order. An empty queue
//! behaves like an unreachable service.

use super::types::{
    CompletionMode, CompletionRequest, CompletionResponse, HealthReport, SearchResult,
    UploadReceipt,
};
use super::{ApiError, ServiceApi};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Health,
    Suggestions,
    Complete {
        mode: CompletionMode,
        request: CompletionRequest,
    },
    Upload {
        file_name: String,
        mime_type: String,
        size: usize,
    },
    Ingest {
        file_id: String,
    },
    Search {
        query: String,
    },
}

type Queue<T> = Mutex<VecDeque<Result<T, ApiError>>>;

pub struct MockServiceApi {
    base_url: Mutex<String>,
    health: Queue<HealthReport>,
    suggestions: Queue<Vec<String>>,
    completions: Queue<CompletionResponse>,
    uploads: Queue<UploadReceipt>,
    ingests: Queue<()>,
    searches: Queue<Vec<SearchResult>>,
    calls: Mutex<Vec<ApiCall>>,
    /// Applied to every call, so tests can interleave operations
    delay: Option<Duration>,
}

impl Default for MockServiceApi {
    fn default() -> Self {
        Self::new()
    }
}

fn pop<T>(queue: &Queue<T>) -> Result<T, ApiError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ApiError::transport("No mock response queued")))
}

impl MockServiceApi {
    pub fn new() -> Self {
        Self {
            base_url: Mutex::new("http://mock.test".to_string()),
            health: Mutex::new(VecDeque::new()),
            suggestions: Mutex::new(VecDeque::new()),
            completions: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(VecDeque::new()),
            ingests: Mutex::new(VecDeque::new()),
            searches: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_health(&self, result: Result<HealthReport, ApiError>) {
        self.health.lock().unwrap().push_back(result);
    }

    pub fn queue_suggestions(&self, result: Result<Vec<String>, ApiError>) {
        self.suggestions.lock().unwrap().push_back(result);
    }

    pub fn queue_completion(&self, result: Result<CompletionResponse, ApiError>) {
        self.completions.lock().unwrap().push_back(result);
    }

    pub fn queue_upload(&self, result: Result<UploadReceipt, ApiError>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn queue_ingest(&self, result: Result<(), ApiError>) {
        self.ingests.lock().unwrap().push_back(result);
    }

    pub fn queue_search(&self, result: Result<Vec<SearchResult>, ApiError>) {
        self.searches.lock().unwrap().push_back(result);
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Endpoint mode of every completion attempt
    pub fn completion_modes(&self) -> Vec<CompletionMode> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Complete { mode, .. } => Some(mode),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    async fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ServiceApi for MockServiceApi {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        self.record(ApiCall::Health).await;
        pop(&self.health)
    }

    async fn suggestions(&self) -> Result<Vec<String>, ApiError> {
        self.record(ApiCall::Suggestions).await;
        pop(&self.suggestions)
    }

    async fn complete(
        &self,
        mode: CompletionMode,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError> {
        self.record(ApiCall::Complete {
            mode,
            request: request.clone(),
        })
        .await;
        pop(&self.completions)
    }

    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ApiError> {
        self.record(ApiCall::Upload {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len(),
        })
        .await;
        pop(&self.uploads)
    }

    async fn ingest(&self, file_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Ingest {
            file_id: file_id.to_string(),
        })
        .await;
        pop(&self.ingests)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.record(ApiCall::Search {
            query: query.to_string(),
        })
        .await;
        pop(&self.searches)
    }

    fn base_url(&self) -> String {
        self.base_url.lock().unwrap().clone()
    }

    fn set_base_url(&self, base_url: &str) {
        *self.base_url.lock().unwrap() = base_url.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pops_in_order_then_fails() {
        let mock = MockServiceApi::new();
        mock.queue_search(Ok(vec![]));
        mock.queue_search(Err(ApiError::http(500, "boom")));

        assert!(mock.search("a").await.unwrap().is_empty());
        assert_eq!(mock.search("b").await.unwrap_err().status, Some(500));
        assert!(mock.search("c").await.unwrap_err().is_retryable());
        assert_eq!(mock.calls().len(), 3);
    }
}
