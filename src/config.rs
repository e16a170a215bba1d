//! Client configuration
//!
//! Settings come from the environment; the service address additionally
//! lives in a persisted key-value store so a working address survives
//! restarts.

mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};

use crate::dispatch::RetryPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Address used when nothing is stored or configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Model name sent with completions (the service uses its own loaded model)
pub const DEFAULT_MODEL: &str = "openkimi-model";

/// Store key for the last address that passed a health probe
pub const API_URL_KEY: &str = "api_url";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Address forced by the environment, taking precedence over the store
    pub base_url_override: Option<String>,
    /// Location of the persisted settings file
    pub state_path: PathBuf,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url_override: None,
            state_path: default_state_path(None),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            retry: RetryPolicy::default(),
        }
    }
}

fn default_state_path(home: Option<String>) -> PathBuf {
    let home = home.unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".openkimi").join("client.json")
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value = %value, "Ignoring unparseable setting");
            None
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_var("OPENKIMI_RETRY_ATTEMPTS", lookup("OPENKIMI_RETRY_ATTEMPTS"))
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.max_attempts),
            backoff: parse_var("OPENKIMI_RETRY_BACKOFF_MS", lookup("OPENKIMI_RETRY_BACKOFF_MS"))
                .map_or(defaults.backoff, Duration::from_millis),
        };

        Self {
            base_url_override: lookup("OPENKIMI_API_URL").filter(|url| !url.trim().is_empty()),
            state_path: lookup("OPENKIMI_STATE_PATH")
                .map_or_else(|| default_state_path(lookup("HOME")), PathBuf::from),
            model: lookup("OPENKIMI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: parse_var("OPENKIMI_TEMPERATURE", lookup("OPENKIMI_TEMPERATURE")),
            max_tokens: parse_var("OPENKIMI_MAX_TOKENS", lookup("OPENKIMI_MAX_TOKENS")),
            retry,
        }
    }

    /// Address to start with: environment override, then the stored value,
    /// then the default
    pub fn initial_base_url(&self, store: &dyn KeyValueStore) -> String {
        self.base_url_override
            .clone()
            .or_else(|| store.get(API_URL_KEY))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}
