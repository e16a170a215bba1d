//! Wire types for the completion/search/ingestion service

use crate::session::Role;
use serde::{Deserialize, Serialize};

/// Which completion endpoint a dispatch is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    #[default]
    Standard,
    /// Long-form "deep reasoning" variant, slower to answer
    ExtendedReasoning,
}

impl CompletionMode {
    pub fn from_flag(extended_reasoning: bool) -> Self {
        if extended_reasoning {
            CompletionMode::ExtendedReasoning
        } else {
            CompletionMode::Standard
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            CompletionMode::Standard => "/v1/chat/completions",
            CompletionMode::ExtendedReasoning => "/v1/chat/deep_reasoning",
        }
    }
}

/// A single `{role, content}` pair as the service expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Completion body. Every level is optional so that a structurally
/// incomplete answer reaches the dispatch pipeline as a value it can judge,
/// rather than as a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Build a response carrying a single assistant text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![CompletionChoice {
                message: Some(ChoiceMessage {
                    content: Some(content.into()),
                }),
            }],
        }
    }

    /// Content of the first choice, if the service sent one
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
    }
}

/// `/health` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub engine_initialized: bool,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub file_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct IngestRequest<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// One web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// Error body. `detail` is usually a string but validation failures carry a
/// structured list, so keep it loose.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}
