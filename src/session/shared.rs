//! Shared handle to the session aggregate and scoped busy flags

use super::state::{BusyKind, Session};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Signals for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// History changed; show the latest entry
    ScrollToLatest,
}

/// Reasons a user-initiated call is rejected as a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a {0} is already in progress")]
    Busy(BusyKind),
    #[error("no files selected")]
    NoFilesSelected,
}

/// Cloneable handle to the single session a client owns.
///
/// The lock is only ever held inside `read`/`update` closures, never across
/// an await point.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
    events: broadcast::Sender<UiEvent>,
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new(Session::new())
    }
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(session)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inspect the session
    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the session, signalling the presentation layer if history changed
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let (result, changed) = {
            let mut session = self.lock();
            let before = session.revision();
            let result = f(&mut session);
            (result, session.revision() != before)
        };
        if changed {
            // Nobody listening is fine
            let _ = self.events.send(UiEvent::ScrollToLatest);
        }
        result
    }

    /// Mutate the session only if no reset happened since `epoch`
    pub(crate) fn update_if_current<R>(
        &self,
        epoch: u64,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        self.update(|session| {
            if session.epoch() == epoch {
                Some(f(session))
            } else {
                tracing::debug!(
                    started = epoch,
                    current = session.epoch(),
                    "Discarding result from before reset"
                );
                None
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    /// Set a busy flag, or report that the category is already running
    pub(crate) fn try_acquire(&self, kind: BusyKind) -> Result<BusyGuard, SessionError> {
        let epoch = self.update(|session| {
            if session.busy().is_set(kind) {
                return Err(SessionError::Busy(kind));
            }
            session.set_busy(kind, true);
            Ok(session.epoch())
        })?;

        Ok(BusyGuard {
            session: self.clone(),
            kind,
            epoch,
        })
    }
}

/// A held busy flag, cleared on drop along every exit path.
///
/// A guard from before a reset leaves flags alone: the reset already cleared
/// them and a newer operation may own the flag now.
#[must_use = "dropping the guard releases the busy flag immediately"]
pub struct BusyGuard {
    session: SharedSession,
    kind: BusyKind,
    epoch: u64,
}

impl BusyGuard {
    pub fn kind(&self) -> BusyKind {
        self.kind
    }

    /// Session epoch the guarded operation started in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let (kind, epoch) = (self.kind, self.epoch);
        self.session.update(|session| {
            if session.epoch() == epoch {
                session.set_busy(kind, false);
            }
        });
    }
}

impl std::fmt::Debug for BusyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyGuard")
            .field("kind", &self.kind)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
