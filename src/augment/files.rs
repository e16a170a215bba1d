//! Document upload and ingestion

use super::AugmentError;
use crate::api::ServiceApi;
use crate::session::{BusyGuard, BusyKind, FileStatus, Role, SharedSession, UploadedFile};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Document types the service can ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    WordLegacy,
    WordOoxml,
    PlainText,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Pdf,
        DocumentKind::WordLegacy,
        DocumentKind::WordOoxml,
        DocumentKind::PlainText,
    ];

    /// Canonical MIME type sent with the upload
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::WordLegacy => "application/msword",
            DocumentKind::WordOoxml => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::PlainText => "text/plain",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::WordLegacy => "doc",
            DocumentKind::WordOoxml => "docx",
            DocumentKind::PlainText => "txt",
        }
    }

    /// Match a declared type, ignoring case and parameters like `charset`
    pub fn from_mime(declared: &str) -> Option<Self> {
        let essence = declared.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime_type().eq_ignore_ascii_case(essence))
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileValidationError {
    #[error("unsupported file type for {name} ({}); accepted types are PDF, DOC, DOCX and TXT", .declared_type.as_deref().unwrap_or("unknown type"))]
    UnsupportedType {
        name: String,
        declared_type: Option<String>,
    },
}

/// Accept a file when either its declared type or its extension is allowed
pub fn classify(name: &str, declared_type: Option<&str>) -> Result<DocumentKind, FileValidationError> {
    declared_type
        .and_then(DocumentKind::from_mime)
        .or_else(|| DocumentKind::from_file_name(name))
        .ok_or_else(|| FileValidationError::UnsupportedType {
            name: name.to_string(),
            declared_type: declared_type.map(str::to_string),
        })
}

/// A file the user selected for upload
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, declared_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, guessing its declared type from the path
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let declared_type = mime_guess::from_path(path).first_raw();
        Ok(Self::new(name, declared_type, bytes))
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// How one file of a batch ended. `Ok` carries the service's file id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub name: String,
    pub result: Result<String, AugmentError>,
}

pub struct FileIngestor {
    api: Arc<dyn ServiceApi>,
}

impl FileIngestor {
    pub fn new(api: Arc<dyn ServiceApi>) -> Self {
        Self { api }
    }

    /// Upload then ingest each file in order.
    ///
    /// A failure only affects its own file. Stops early if the session is
    /// reset mid-batch; files not reached have no outcome.
    pub async fn upload_batch(
        &self,
        session: &SharedSession,
        guard: BusyGuard,
        files: Vec<FileUpload>,
    ) -> Vec<FileOutcome> {
        debug_assert_eq!(guard.kind(), BusyKind::Uploading);
        let epoch = guard.epoch();
        tracing::info!(count = files.len(), "Uploading file batch");

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            if session.read(|s| s.epoch()) != epoch {
                tracing::info!("Session reset during upload batch; stopping");
                break;
            }
            let result = self.process(session, epoch, &file).await;
            if let Err(e) = &result {
                tracing::warn!(file = %file.name, error = %e, "File not ingested");
            }
            outcomes.push(FileOutcome {
                name: file.name,
                result,
            });
        }

        session.update_if_current(epoch, |s| s.clear_selected_files());
        drop(guard);
        outcomes
    }

    async fn process(
        &self,
        session: &SharedSession,
        epoch: u64,
        file: &FileUpload,
    ) -> Result<String, AugmentError> {
        let name = &file.name;

        let kind = match classify(name, file.declared_type.as_deref()) {
            Ok(kind) => kind,
            Err(e) => {
                session.update_if_current(epoch, |s| {
                    s.push_message(Role::System, format!("Skipped {name}: {e}"))
                });
                return Err(e.into());
            }
        };

        let receipt = match self.api.upload(name, kind.mime_type(), &file.bytes).await {
            Ok(receipt) => receipt,
            Err(e) => {
                session.update_if_current(epoch, |s| {
                    s.push_message(Role::System, format!("Upload of {name} failed: {e}"))
                });
                return Err(AugmentError::Upload(e));
            }
        };
        let file_id = receipt.file_id;
        tracing::info!(file = %name, file_id = %file_id, kind = ?kind, "File uploaded");

        let recorded = session.update_if_current(epoch, |s| {
            s.record_upload(UploadedFile {
                id: file_id.clone(),
                display_name: name.clone(),
                kind,
                status: FileStatus::Uploaded,
            });
            s.activate();
            s.push_message(Role::System, format!("File received: {name}"));
            s.advance_file(&file_id, FileStatus::Processing);
        });
        if recorded.is_none() {
            return Ok(file_id);
        }

        match self.api.ingest(&file_id).await {
            Ok(()) => {
                session.update_if_current(epoch, |s| {
                    s.advance_file(&file_id, FileStatus::Processed);
                    s.push_message(
                        Role::Assistant,
                        format!("{name} has been processed. You can now ask questions about its content."),
                    );
                });
                Ok(file_id)
            }
            Err(e) => {
                session.update_if_current(epoch, |s| {
                    s.advance_file(&file_id, FileStatus::Failed);
                    s.push_message(Role::Assistant, format!("Processing {name} failed: {e}"));
                });
                Err(AugmentError::Ingest(e))
            }
        }
    }
}
