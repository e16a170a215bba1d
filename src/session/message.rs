//! Conversation messages

use crate::render::render_markdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique, monotonically increasing message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MessageId(pub(crate) u64);

impl MessageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A message in the session history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Markup ready for display, rendered when the content was set
    pub html: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Placeholder awaiting its single in-place replacement
    pub pending: bool,
}

impl Message {
    pub(crate) fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let html = Some(render_markdown(Some(&content)));
        Self {
            id,
            role,
            content,
            html,
            created_at: Utc::now(),
            pending: false,
        }
    }

    pub(crate) fn placeholder(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            pending: true,
            ..Self::new(id, role, content)
        }
    }

    /// Replace a placeholder's content. Returns false for settled messages.
    pub(crate) fn resolve(&mut self, content: impl Into<String>) -> bool {
        if !self.pending {
            return false;
        }
        self.content = content.into();
        self.html = Some(render_markdown(Some(&self.content)));
        self.pending = false;
        true
    }
}
