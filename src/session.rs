//! Conversation session
//!
//! One owned aggregate per client. Components receive a [`SharedSession`]
//! handle and mutate it through scoped operations; busy flags are held as
//! [`BusyGuard`]s so they are released on every exit path.

mod message;
mod shared;
mod state;

pub use message::{Message, MessageId, Role};
pub use shared::{BusyGuard, SessionError, SharedSession, UiEvent};
pub use state::{
    BusyFlags, BusyKind, FileStatus, ModeFlags, Session, SessionState, UploadedFile,
};
