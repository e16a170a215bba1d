//! Starter prompts shown before the first message

use crate::api::ServiceApi;
use crate::session::SharedSession;
use std::sync::Arc;

pub struct SuggestionLoader {
    api: Arc<dyn ServiceApi>,
}

impl SuggestionLoader {
    pub fn new(api: Arc<dyn ServiceApi>) -> Self {
        Self { api }
    }

    /// Fetch suggestions. Failures yield an empty list.
    pub async fn load(&self) -> Vec<String> {
        match self.api.suggestions().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load suggestions");
                Vec::new()
            }
        }
    }

    /// Fetch and store on the session, returning how many were loaded
    pub async fn refresh(&self, session: &SharedSession) -> usize {
        let list = self.load().await;
        let count = list.len();
        session.update(|s| s.set_suggestions(list));
        count
    }
}
