//! `reqwest` implementation of the service boundary

use super::types::{
    CompletionMode, CompletionRequest, CompletionResponse, ErrorBody, HealthReport,
    IngestRequest, SearchRequest, SearchResponse, SearchResult, UploadReceipt,
};
use super::{ApiError, ServiceApi};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{PoisonError, RwLock};

const HEALTH_PATH: &str = "/health";
const SUGGESTIONS_PATH: &str = "/v1/suggestions";
const UPLOAD_PATH: &str = "/v1/files";
const INGEST_PATH: &str = "/v1/files/process";
const SEARCH_PATH: &str = "/v1/search";

/// HTTP client for the service. Individual requests carry no timeout;
/// callers bound their own attempts.
pub struct HttpServiceApi {
    client: Client,
    base_url: RwLock<String>,
}

impl HttpServiceApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: RwLock::new(base_url.into()),
        })
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url();
        format!("{}{path}", base.trim_end_matches('/'))
    }

    /// Send a request and return the body of a success response
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        Ok(body)
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::transport(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        ApiError::transport(format!("Connection failed: {e}"))
    } else {
        ApiError::transport(format!("Request failed: {e}"))
    }
}

/// Classify a non-success response, embedding the service's `detail`
pub(crate) fn error_from_status(status: StatusCode, body: &str) -> ApiError {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
        }) => detail,
        Ok(ErrorBody {
            detail: Some(detail),
        }) => detail.to_string(),
        Ok(ErrorBody { detail: None }) => reason.to_string(),
        Err(_) => "could not parse error response".to_string(),
    };

    ApiError::http(
        status.as_u16(),
        format!("API error ({} {reason}): {detail}", status.as_u16()),
    )
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::parse(format!("Failed to parse response: {e} - body: {body}")))
}

#[async_trait]
impl ServiceApi for HttpServiceApi {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        let body = self.send(self.client.get(self.url(HEALTH_PATH))).await?;
        parse_body(&body)
    }

    async fn suggestions(&self) -> Result<Vec<String>, ApiError> {
        let body = self.send(self.client.get(self.url(SUGGESTIONS_PATH))).await?;
        parse_body(&body)
    }

    async fn complete(
        &self,
        mode: CompletionMode,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError> {
        let body = self
            .send(self.client.post(self.url(mode.path())).json(request))
            .await?;
        parse_body(&body)
    }

    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ApiError> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| ApiError::transport(format!("Failed to build upload request: {e}")))?;
        let form = Form::new().part("file", part);

        let body = self
            .send(self.client.post(self.url(UPLOAD_PATH)).multipart(form))
            .await?;
        parse_body(&body)
    }

    async fn ingest(&self, file_id: &str) -> Result<(), ApiError> {
        // The acknowledgement body carries nothing the client needs
        self.send(
            self.client
                .post(self.url(INGEST_PATH))
                .json(&IngestRequest { file_id }),
        )
        .await?;
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let body = self
            .send(
                self.client
                    .post(self.url(SEARCH_PATH))
                    .json(&SearchRequest { query }),
            )
            .await?;
        let response: SearchResponse = parse_body(&body)?;
        Ok(response.results)
    }

    fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_base_url(&self, base_url: &str) {
        *self
            .base_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = base_url.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiErrorKind;

    #[test]
    fn test_error_embeds_string_detail() {
        let err = error_from_status(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"detail":"KimiEngine not initialized. Check server logs."}"#,
        );
        assert_eq!(err.kind, ApiErrorKind::Http);
        assert!(err.is_retryable());
        assert_eq!(
            err.message,
            "API error (503 Service Unavailable): KimiEngine not initialized. Check server logs."
        );
    }

    #[test]
    fn test_error_structured_detail() {
        let err = error_from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","messages"],"msg":"field required"}]}"#,
        );
        assert!(!err.is_retryable());
        assert!(err.message.contains("field required"));
    }

    #[test]
    fn test_error_without_detail_uses_reason() {
        let err = error_from_status(StatusCode::BAD_REQUEST, "{}");
        assert_eq!(err.message, "API error (400 Bad Request): Bad Request");
    }

    #[test]
    fn test_error_unparseable_body() {
        let err = error_from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.status, Some(500));
        assert!(err.message.ends_with("could not parse error response"));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = HttpServiceApi::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(api.url(HEALTH_PATH), "http://127.0.0.1:8000/health");

        api.set_base_url("http://example.test:9000");
        assert_eq!(
            api.url(CompletionMode::ExtendedReasoning.path()),
            "http://example.test:9000/v1/chat/deep_reasoning"
        );
    }

    #[test]
    fn test_parse_body_failure_is_parse_error() {
        let err = parse_body::<UploadReceipt>("not json").unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Parse);
    }
}
