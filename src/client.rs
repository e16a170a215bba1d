//! Client orchestrator
//!
//! [`ChatClient`] is the entry point for the presentation layer. It owns the
//! session and wires user actions to the dispatch, augmentation,
//! connectivity and suggestion components. Rejected calls return a
//! [`SessionError`] and leave the session untouched.

use crate::api::ServiceApi;
use crate::augment::{FileIngestor, FileOutcome, FileUpload, SearchOutcome, WebSearcher};
use crate::config::{ClientConfig, KeyValueStore};
use crate::connectivity::{ConnectionStatus, ConnectivityMonitor};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::session::{BusyKind, ModeFlags, Role, Session, SessionError, SharedSession};
use crate::suggestions::SuggestionLoader;
use std::sync::Arc;

pub struct ChatClient {
    session: SharedSession,
    api: Arc<dyn ServiceApi>,
    dispatcher: Dispatcher,
    ingestor: FileIngestor,
    searcher: WebSearcher,
    monitor: ConnectivityMonitor,
    suggestions: SuggestionLoader,
}

impl ChatClient {
    /// Build a client. The service address is taken from the environment
    /// override, then the store, then the default.
    pub fn new(
        api: Arc<dyn ServiceApi>,
        store: Arc<dyn KeyValueStore>,
        config: &ClientConfig,
    ) -> Self {
        let base_url = config.initial_base_url(store.as_ref());
        api.set_base_url(&base_url);
        tracing::info!(base_url = %base_url, model = %config.model, "Chat client created");

        Self {
            session: SharedSession::default(),
            dispatcher: Dispatcher::new(api.clone(), config),
            ingestor: FileIngestor::new(api.clone()),
            searcher: WebSearcher::new(api.clone()),
            monitor: ConnectivityMonitor::new(api.clone(), store),
            suggestions: SuggestionLoader::new(api.clone()),
            api,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn base_url(&self) -> String {
        self.api.base_url()
    }

    /// Probe the service and load starter suggestions
    pub async fn start(&self) -> ConnectionStatus {
        let status = self.check_health().await;
        self.refresh_suggestions().await;
        status
    }

    // ==================== Inputs ====================

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.session.update(|s| s.set_input(text));
    }

    pub fn set_extended_reasoning(&self, enabled: bool) {
        self.update_modes(|modes| modes.extended_reasoning = enabled);
    }

    pub fn set_web_search(&self, enabled: bool) {
        self.update_modes(|modes| modes.web_search = enabled);
    }

    fn update_modes(&self, f: impl FnOnce(&mut ModeFlags)) {
        let modes = self.session.update(|s| {
            let mut modes = s.modes();
            f(&mut modes);
            s.set_modes(modes);
            modes
        });
        tracing::debug!(?modes, "Modes changed");
    }

    pub fn select_files(&self, files: Vec<FileUpload>) {
        self.session.update(|s| s.set_selected_files(files));
    }

    // ==================== Operations ====================

    /// Send the input box as a user turn and record the reply.
    ///
    /// With web search on, results are injected into the history before the
    /// completion is requested.
    pub async fn submit(&self) -> Result<DispatchOutcome, SessionError> {
        let content = self.session.read(|s| s.input().trim().to_string());
        if content.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let guard = self.session.try_acquire(BusyKind::Dispatching)?;

        let web_search = self.session.update(|s| {
            s.activate();
            s.clear_input();
            s.push_message(Role::User, content.clone());
            s.modes().web_search
        });

        if web_search {
            match self.session.try_acquire(BusyKind::Searching) {
                Ok(search_guard) => {
                    self.searcher.run(&self.session, search_guard, &content).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping web search for this message");
                }
            }

            if self.session.read(Session::epoch) != guard.epoch() {
                tracing::info!("Session reset during web search; not dispatching");
                return Ok(DispatchOutcome::Discarded);
            }
        }

        Ok(self.dispatcher.dispatch(&self.session, guard, &content).await)
    }

    /// Search the web for the input box contents without sending a message.
    /// The input is left in place.
    pub async fn search(&self) -> Result<SearchOutcome, SessionError> {
        let query = self.session.read(|s| s.input().trim().to_string());
        if query.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let guard = self.session.try_acquire(BusyKind::Searching)?;
        self.session.update(Session::activate);

        Ok(self.searcher.run(&self.session, guard, &query).await)
    }

    /// Upload and ingest the selected files
    pub async fn upload_selected(&self) -> Result<Vec<FileOutcome>, SessionError> {
        let files = self.session.read(|s| s.selected_files().to_vec());
        if files.is_empty() {
            return Err(SessionError::NoFilesSelected);
        }
        let guard = self.session.try_acquire(BusyKind::Uploading)?;

        Ok(self.ingestor.upload_batch(&self.session, guard, files).await)
    }

    pub async fn check_health(&self) -> ConnectionStatus {
        self.monitor.probe(&self.session).await
    }

    /// Point the client at a new address and probe it. The address is only
    /// remembered if the probe gets an answer.
    pub async fn set_service_url(&self, url: &str) -> ConnectionStatus {
        let url = url.trim().trim_end_matches('/');
        tracing::info!(base_url = %url, "Changing service address");
        self.api.set_base_url(url);
        self.check_health().await
    }

    /// Start over with an empty conversation. Operations still in flight
    /// finish, but their results are dropped.
    pub async fn reset(&self) {
        let old_id = self.session.update(|s| {
            let id = s.id();
            s.reset();
            id
        });
        tracing::info!(session_id = %old_id, "Session reset");
        self.refresh_suggestions().await;
    }

    pub async fn refresh_suggestions(&self) -> usize {
        self.suggestions.refresh(&self.session).await
    }
}
