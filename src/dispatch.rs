//! Message dispatch pipeline
//!
//! Sends the conversation to the completion service and records exactly one
//! assistant reply per user turn: the model's answer, or a description of
//! why there is none. Errors never leave this module as values the caller
//! must handle; they become conversation entries.

mod retry;

#[cfg(test)]
mod proptests;

pub use retry::{with_retry, RetryFailure, RetryPolicy};

use crate::api::{ApiError, ApiErrorKind, CompletionMode, CompletionRequest, ServiceApi, WireMessage};
use crate::config::ClientConfig;
use crate::session::{BusyGuard, BusyKind, Message, MessageId, Role, SharedSession};
use std::sync::Arc;
use thiserror::Error;

/// Why a dispatch produced an error entry instead of an answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("could not connect to the service after {attempts} attempts (no response, no status): {message}")]
    Unreachable { attempts: u32, message: String },
    #[error("failed after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },
    #[error("{0}")]
    Http(ApiError),
    #[error("invalid API response format: {0}")]
    Parse(String),
}

impl From<RetryFailure> for DispatchError {
    fn from(failure: RetryFailure) -> Self {
        let RetryFailure { attempts, error } = failure;
        match error.kind {
            ApiErrorKind::Transport => DispatchError::Unreachable {
                attempts,
                message: error.message,
            },
            ApiErrorKind::Http if error.is_retryable() => DispatchError::Unavailable {
                attempts,
                message: error.message,
            },
            ApiErrorKind::Http => DispatchError::Http(error),
            ApiErrorKind::Parse => DispatchError::Parse(error.message),
        }
    }
}

/// What a dispatch left in the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied(MessageId),
    Failed {
        message: MessageId,
        error: DispatchError,
    },
    /// The session was reset while the request was in flight
    Discarded,
}

/// Project history to wire messages, preserving order.
///
/// The completion must answer a user turn: if the last entry is anything
/// else, `pending_user` is appended as a trailing user message.
pub fn project_history(history: &[Message], pending_user: &str) -> Vec<WireMessage> {
    let mut messages: Vec<WireMessage> = history
        .iter()
        .map(|msg| WireMessage::new(msg.role, msg.content.clone()))
        .collect();

    if messages.last().map(|m| m.role) != Some(Role::User) {
        messages.push(WireMessage::new(Role::User, pending_user));
    }
    messages
}

/// Text appended to the history when a dispatch fails
pub fn error_entry(error: &DispatchError) -> String {
    format!("An error occurred: {error}")
}

pub struct Dispatcher {
    api: Arc<dyn ServiceApi>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn ServiceApi>, config: &ClientConfig) -> Self {
        Self {
            api,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: config.retry,
        }
    }

    pub fn build_request(&self, history: &[Message], pending_user: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: project_history(history, pending_user),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Run one dispatch for the user turn `user_content`.
    ///
    /// `guard` must hold the dispatching flag; it is released when this
    /// returns, whatever the outcome.
    pub async fn dispatch(
        &self,
        session: &SharedSession,
        guard: BusyGuard,
        user_content: &str,
    ) -> DispatchOutcome {
        debug_assert_eq!(guard.kind(), BusyKind::Dispatching);

        let (request, mode) = session.read(|s| {
            (
                self.build_request(s.history(), user_content),
                CompletionMode::from_flag(s.modes().extended_reasoning),
            )
        });

        tracing::info!(
            mode = ?mode,
            messages = request.messages.len(),
            "Dispatching conversation"
        );

        let result = with_retry(self.retry, |attempt| {
            tracing::debug!(attempt, mode = ?mode, "Completion attempt");
            self.api.complete(mode, &request)
        })
        .await;

        let reply = match result {
            Ok(response) => response.first_content().map(|c| c.trim().to_string()).ok_or_else(|| {
                DispatchError::Parse("response has no choices[0].message.content".to_string())
            }),
            Err(failure) => Err(DispatchError::from(failure)),
        };

        let outcome = session.update_if_current(guard.epoch(), |s| match reply {
            Ok(text) => DispatchOutcome::Replied(s.push_message(Role::Assistant, text)),
            Err(error) => {
                let message = s.push_message(Role::Assistant, error_entry(&error));
                DispatchOutcome::Failed { message, error }
            }
        });
        drop(guard);

        match &outcome {
            Some(DispatchOutcome::Failed { error, .. }) => {
                tracing::error!(error = %error, "Dispatch failed");
            }
            None => {
                tracing::info!("Dispatch result discarded after reset");
            }
            Some(_) => {}
        }

        outcome.unwrap_or(DispatchOutcome::Discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{ApiCall, MockServiceApi};
    use crate::api::CompletionResponse;
    use crate::session::{ModeFlags, Session};
    use std::time::Duration;
    use tokio::time::Instant;

    fn setup(mock: MockServiceApi) -> (Arc<MockServiceApi>, Dispatcher, SharedSession) {
        let api = Arc::new(mock);
        let dispatcher = Dispatcher::new(api.clone(), &ClientConfig::default());
        (api, dispatcher, SharedSession::default())
    }

    fn with_user_turn(session: &SharedSession, text: &str) -> BusyGuard {
        let guard = session.try_acquire(BusyKind::Dispatching).unwrap();
        session.update(|s| s.push_message(Role::User, text));
        guard
    }

    #[test]
    fn test_projection_keeps_order_and_roles() {
        let mut session = Session::new();
        session.push_message(Role::System, "context");
        session.push_message(Role::User, "hi");
        session.push_message(Role::Assistant, "hello");
        session.push_message(Role::User, "how are you");

        let wire = project_history(session.history(), "how are you");
        let roles: Vec<Role> = wire.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(wire[3].content, "how are you");
    }

    #[test]
    fn test_projection_appends_trailing_user_turn() {
        let mut session = Session::new();
        session.push_message(Role::User, "weather today");
        session.push_message(Role::Assistant, "Web results: ...");

        let wire = project_history(session.history(), "weather today");
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[2], WireMessage::new(Role::User, "weather today"));

        let empty = project_history(&[], "first");
        assert_eq!(empty, vec![WireMessage::new(Role::User, "first")]);
    }

    #[tokio::test]
    async fn test_success_appends_trimmed_reply() {
        let mock = MockServiceApi::new();
        mock.queue_completion(Ok(CompletionResponse::text("  Hello there!\n")));
        let (api, dispatcher, session) = setup(mock);

        let guard = with_user_turn(&session, "Hi");
        let outcome = dispatcher.dispatch(&session, guard, "Hi").await;

        assert!(matches!(outcome, DispatchOutcome::Replied(_)));
        session.read(|s| {
            assert_eq!(s.history().len(), 2);
            assert_eq!(s.history()[1].role, Role::Assistant);
            assert_eq!(s.history()[1].content, "Hello there!");
            assert!(!s.busy().is_set(BusyKind::Dispatching));
        });
        assert_eq!(api.completion_modes(), vec![CompletionMode::Standard]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extended_reasoning_routes_every_attempt() {
        let mock = MockServiceApi::new();
        mock.queue_completion(Err(ApiError::transport("reset")));
        mock.queue_completion(Ok(CompletionResponse::text("deep answer")));
        let (api, dispatcher, session) = setup(mock);
        session.update(|s| {
            s.set_modes(ModeFlags {
                extended_reasoning: true,
                web_search: false,
            });
        });

        let guard = with_user_turn(&session, "prove it");
        // Flipping the flag mid-sequence must not change the endpoint
        let toggled = session.clone();
        let dispatch = dispatcher.dispatch(&session, guard, "prove it");
        tokio::pin!(dispatch);
        tokio::select! {
            biased;
            _ = &mut dispatch => {}
            () = async {
                toggled.update(|s| s.set_modes(ModeFlags::default()));
                std::future::pending::<()>().await;
            } => {}
        }

        assert_eq!(
            api.completion_modes(),
            vec![
                CompletionMode::ExtendedReasoning,
                CompletionMode::ExtendedReasoning
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_unavailable_gives_three_attempts() {
        let mock = MockServiceApi::new();
        for _ in 0..4 {
            mock.queue_completion(Err(ApiError::http(503, "API error (503 Service Unavailable): not initialized")));
        }
        let (api, dispatcher, session) = setup(mock);

        let started = Instant::now();
        let guard = with_user_turn(&session, "Hi");
        let outcome = dispatcher.dispatch(&session, guard, "Hi").await;

        assert_eq!(api.completion_modes().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        let DispatchOutcome::Failed { error, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(matches!(error, DispatchError::Unavailable { attempts: 3, .. }));
        session.read(|s| {
            let last = s.history().last().unwrap();
            assert_eq!(last.role, Role::Assistant);
            assert!(last.content.contains("failed after 3 attempts"));
            assert!(last.content.contains("not initialized"));
            assert!(!s.busy().any());
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_message_synthesized() {
        // Empty queue: every call is a transport failure
        let (api, dispatcher, session) = setup(MockServiceApi::new());
        let guard = with_user_turn(&session, "Hi");
        dispatcher.dispatch(&session, guard, "Hi").await;

        assert_eq!(api.calls().len(), 3);
        session.read(|s| {
            let last = s.history().last().unwrap();
            assert!(last.content.starts_with("An error occurred: could not connect"));
            assert!(last.content.contains("no response, no status"));
        });
    }

    #[tokio::test]
    async fn test_terminal_status_not_retried() {
        let mock = MockServiceApi::new();
        mock.queue_completion(Err(ApiError::http(400, "API error (400 Bad Request): No user message found in the request.")));
        mock.queue_completion(Ok(CompletionResponse::text("never")));
        let (api, dispatcher, session) = setup(mock);

        let guard = with_user_turn(&session, "Hi");
        let outcome = dispatcher.dispatch(&session, guard, "Hi").await;

        assert_eq!(api.completion_modes().len(), 1);
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { error: DispatchError::Http(_), .. }
        ));
        session.read(|s| {
            assert!(s.history()[1].content.contains("No user message found"));
        });
    }

    #[tokio::test]
    async fn test_missing_choices_is_parse_failure() {
        let mock = MockServiceApi::new();
        mock.queue_completion(Ok(CompletionResponse::default()));
        let (_api, dispatcher, session) = setup(mock);

        let guard = with_user_turn(&session, "Hi");
        let outcome = dispatcher.dispatch(&session, guard, "Hi").await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { error: DispatchError::Parse(_), .. }
        ));
        session.read(|s| {
            assert_eq!(s.history().len(), 2);
            assert!(s.history()[1].content.contains("invalid API response format"));
        });
    }

    #[tokio::test]
    async fn test_request_carries_model_and_history() {
        let mock = MockServiceApi::new();
        mock.queue_completion(Ok(CompletionResponse::text("ok")));
        let (api, dispatcher, session) = setup(mock);

        session.update(|s| s.push_message(Role::System, "File received: notes.txt"));
        let guard = with_user_turn(&session, "summarize");
        dispatcher.dispatch(&session, guard, "summarize").await;

        let calls = api.calls();
        let ApiCall::Complete { request, .. } = &calls[0] else {
            panic!("expected completion call");
        };
        assert_eq!(request.model, "openkimi-model");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "summarize");
    }

    #[tokio::test]
    async fn test_reply_after_reset_is_discarded() {
        let mock = MockServiceApi::new().with_delay(Duration::from_millis(50));
        mock.queue_completion(Ok(CompletionResponse::text("late")));
        let (_api, dispatcher, session) = setup(mock);

        let guard = with_user_turn(&session, "Hi");
        let resetter = session.clone();
        let (outcome, ()) = tokio::join!(dispatcher.dispatch(&session, guard, "Hi"), async move {
            resetter.update(Session::reset);
        });

        assert_eq!(outcome, DispatchOutcome::Discarded);
        session.read(|s| {
            assert!(s.history().is_empty());
            assert!(!s.busy().any());
        });
    }
}
