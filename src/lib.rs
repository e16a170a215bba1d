//! OpenKimi chat client
//!
//! Session orchestration for a conversational client of the OpenKimi
//! service: history and mode state, completion dispatch with retry,
//! document ingestion, web search injection and safe rendering.

// Library surface: results are routinely discarded by the terminal front end
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions, clippy::doc_markdown)]

pub mod api;
pub mod augment;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod dispatch;
pub mod render;
pub mod session;
pub mod suggestions;

pub use client::ChatClient;
