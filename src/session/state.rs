//! Session aggregate

use super::message::{Message, MessageId, Role};
use crate::api::SearchResult;
use crate::augment::{DocumentKind, FileUpload};
use crate::connectivity::ConnectionStatus;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of the one session a client owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing sent or uploaded yet; suggestions are shown
    #[default]
    NotStarted,
    /// Stays active until an explicit reset
    Active,
}

/// User-controlled mode toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeFlags {
    pub extended_reasoning: bool,
    pub web_search: bool,
}

/// Operation categories guarded against re-entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyKind {
    Dispatching,
    Uploading,
    Searching,
}

impl fmt::Display for BusyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusyKind::Dispatching => "dispatch",
            BusyKind::Uploading => "upload",
            BusyKind::Searching => "search",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BusyFlags {
    dispatching: bool,
    uploading: bool,
    searching: bool,
}

impl BusyFlags {
    pub fn is_set(&self, kind: BusyKind) -> bool {
        match kind {
            BusyKind::Dispatching => self.dispatching,
            BusyKind::Uploading => self.uploading,
            BusyKind::Searching => self.searching,
        }
    }

    pub fn any(&self) -> bool {
        self.dispatching || self.uploading || self.searching
    }

    pub(crate) fn set(&mut self, kind: BusyKind, value: bool) {
        match kind {
            BusyKind::Dispatching => self.dispatching = value,
            BusyKind::Uploading => self.uploading = value,
            BusyKind::Searching => self.searching = value,
        }
    }
}

/// Processing state of an uploaded document. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl FileStatus {
    pub fn can_advance_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (
                FileStatus::Uploaded,
                FileStatus::Processing | FileStatus::Processed | FileStatus::Failed
            ) | (
                FileStatus::Processing,
                FileStatus::Processed | FileStatus::Failed
            )
        )
    }

    pub fn is_final(self) -> bool {
        matches!(self, FileStatus::Processed | FileStatus::Failed)
    }
}

/// A document the service accepted during this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Identifier assigned by the service
    pub id: String,
    pub display_name: String,
    pub kind: DocumentKind,
    pub status: FileStatus,
}

/// The conversation aggregate: history, mode flags, busy flags and the
/// presentation-facing inputs that go with them.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    history: Vec<Message>,
    uploaded_files: Vec<UploadedFile>,
    selected_files: Vec<FileUpload>,
    modes: ModeFlags,
    busy: BusyFlags,
    input: String,
    last_search: Vec<SearchResult>,
    suggestions: Vec<String>,
    connection: ConnectionStatus,
    next_message_id: u64,
    /// Bumped on every history mutation
    revision: u64,
    /// Bumped on every reset
    epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::NotStarted,
            history: Vec::new(),
            uploaded_files: Vec::new(),
            selected_files: Vec::new(),
            modes: ModeFlags::default(),
            busy: BusyFlags::default(),
            input: String::new(),
            last_search: Vec::new(),
            suggestions: Vec::new(),
            connection: ConnectionStatus::Unknown,
            next_message_id: 1,
            revision: 0,
            epoch: 0,
        }
    }

    // ==================== Queries ====================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.history.iter().find(|m| m.id == id)
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn selected_files(&self) -> &[FileUpload] {
        &self.selected_files
    }

    pub fn modes(&self) -> ModeFlags {
        self.modes
    }

    pub fn busy(&self) -> BusyFlags {
        self.busy
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn last_search(&self) -> &[SearchResult] {
        &self.last_search
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ==================== History ====================

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        id
    }

    pub(crate) fn push_message(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.history.push(Message::new(id, role, content));
        self.revision += 1;
        id
    }

    pub(crate) fn push_placeholder(
        &mut self,
        role: Role,
        content: impl Into<String>,
    ) -> MessageId {
        let id = self.allocate_id();
        self.history.push(Message::placeholder(id, role, content));
        self.revision += 1;
        id
    }

    /// The single permitted in-place edit: settle a pending placeholder
    pub(crate) fn resolve_placeholder(&mut self, id: MessageId, content: impl Into<String>) -> bool {
        let Some(message) = self.history.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        let resolved = message.resolve(content);
        if resolved {
            self.revision += 1;
        }
        resolved
    }

    // ==================== State ====================

    pub(crate) fn activate(&mut self) {
        if self.state == SessionState::NotStarted {
            tracing::debug!(session_id = %self.id, "Session started");
            self.state = SessionState::Active;
        }
    }

    pub(crate) fn set_modes(&mut self, modes: ModeFlags) {
        self.modes = modes;
    }

    pub(crate) fn set_busy(&mut self, kind: BusyKind, value: bool) {
        self.busy.set(kind, value);
    }

    pub(crate) fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub(crate) fn clear_input(&mut self) {
        self.input.clear();
    }

    pub(crate) fn set_selected_files(&mut self, files: Vec<FileUpload>) {
        self.selected_files = files;
    }

    pub(crate) fn clear_selected_files(&mut self) {
        self.selected_files.clear();
    }

    pub(crate) fn set_last_search(&mut self, results: Vec<SearchResult>) {
        self.last_search = results;
    }

    pub(crate) fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.suggestions = suggestions;
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionStatus) {
        self.connection = connection;
    }

    // ==================== Files ====================

    pub(crate) fn record_upload(&mut self, file: UploadedFile) {
        self.uploaded_files.push(file);
    }

    /// Advance a file's status. Backward or sideways moves are refused.
    pub(crate) fn advance_file(&mut self, file_id: &str, status: FileStatus) -> bool {
        let Some(file) = self.uploaded_files.iter_mut().find(|f| f.id == file_id) else {
            return false;
        };
        if !file.status.can_advance_to(status) {
            tracing::warn!(
                file_id,
                from = ?file.status,
                to = ?status,
                "Refusing backward file status transition"
            );
            return false;
        }
        file.status = status;
        true
    }

    /// Back to `NotStarted` with an empty conversation. Mode flags, the
    /// connection status and message id allocation survive.
    pub(crate) fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.state = SessionState::NotStarted;
        self.history.clear();
        self.uploaded_files.clear();
        self.selected_files.clear();
        self.busy = BusyFlags::default();
        self.input.clear();
        self.last_search.clear();
        self.revision += 1;
        self.epoch += 1;
    }
}
