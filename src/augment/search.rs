//! Web search injection

use super::AugmentError;
use crate::api::{SearchResult, ServiceApi};
use crate::session::{BusyGuard, BusyKind, Role, SharedSession};
use std::fmt::Write;
use std::sync::Arc;

pub fn placeholder_text(query: &str) -> String {
    format!("Searching the web for \"{query}\"…")
}

/// Escape characters that would end a link label early
fn escape_label(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Angle-bracket destination, so spaces and parentheses survive verbatim
fn link_destination(link: &str) -> String {
    let mut out = String::with_capacity(link.len() + 2);
    out.push('<');
    for c in link.chars() {
        match c {
            '<' | '>' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('>');
    out
}

/// Markdown block listing results as numbered links
pub fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("Web search for \"{query}\" returned no results.");
    }

    let mut block = format!("Web results for \"{query}\":\n");
    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            block,
            "\n{}. [{}]({})",
            i + 1,
            escape_label(&result.title),
            link_destination(&result.link)
        );
        if !result.snippet.is_empty() {
            let _ = write!(block, "\n   {}", result.snippet);
        }
    }
    block
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(usize),
    /// The placeholder now carries the error
    Failed(AugmentError),
    /// The session was reset while searching
    Discarded,
}

pub struct WebSearcher {
    api: Arc<dyn ServiceApi>,
}

impl WebSearcher {
    pub fn new(api: Arc<dyn ServiceApi>) -> Self {
        Self { api }
    }

    /// Append a pending assistant entry, query the service, then settle the
    /// entry with the results or the error.
    pub async fn run(&self, session: &SharedSession, guard: BusyGuard, query: &str) -> SearchOutcome {
        debug_assert_eq!(guard.kind(), BusyKind::Searching);
        let epoch = guard.epoch();

        let Some(placeholder) = session.update_if_current(epoch, |s| {
            s.push_placeholder(Role::Assistant, placeholder_text(query))
        }) else {
            return SearchOutcome::Discarded;
        };

        tracing::info!(query = %query, "Searching the web");
        let result = self.api.search(query).await;

        let outcome = session.update_if_current(epoch, |s| match result {
            Ok(results) => {
                let count = results.len();
                s.resolve_placeholder(placeholder, format_results(query, &results));
                s.set_last_search(results);
                SearchOutcome::Found(count)
            }
            Err(e) => {
                s.resolve_placeholder(
                    placeholder,
                    format!("Web search for \"{query}\" failed: {e}"),
                );
                SearchOutcome::Failed(AugmentError::Search(e))
            }
        });
        drop(guard);

        match &outcome {
            Some(SearchOutcome::Found(count)) => tracing::info!(count, "Search complete"),
            Some(SearchOutcome::Failed(e)) => tracing::warn!(error = %e, "Search failed"),
            _ => {}
        }
        outcome.unwrap_or(SearchOutcome::Discarded)
    }
}
