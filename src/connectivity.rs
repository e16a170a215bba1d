//! Service health probing

use crate::api::{HealthReport, ServiceApi};
use crate::config::{KeyValueStore, API_URL_KEY};
use crate::session::SharedSession;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

const ENGINE_NOT_READY: &str = "engine not initialized";

/// Latest known reachability of the service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Checking,
    Ready {
        model: String,
    },
    /// Answered, but the engine cannot serve completions yet
    Degraded {
        detail: String,
    },
    Unreachable {
        reason: String,
    },
}

impl ConnectionStatus {
    pub fn from_health(report: &HealthReport) -> Self {
        if report.status == "ok" && report.engine_initialized {
            ConnectionStatus::Ready {
                model: report
                    .model_name
                    .clone()
                    .unwrap_or_else(|| "unknown model".to_string()),
            }
        } else {
            ConnectionStatus::Degraded {
                detail: report
                    .detail
                    .clone()
                    .unwrap_or_else(|| ENGINE_NOT_READY.to_string()),
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionStatus::Ready { .. })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Unknown => f.write_str("unknown"),
            ConnectionStatus::Checking => f.write_str("checking..."),
            ConnectionStatus::Ready { model } => write!(f, "ready ({model})"),
            ConnectionStatus::Degraded { detail } => write!(f, "error: {detail}"),
            ConnectionStatus::Unreachable { reason } => write!(f, "connection failed: {reason}"),
        }
    }
}

pub struct ConnectivityMonitor {
    api: Arc<dyn ServiceApi>,
    store: Arc<dyn KeyValueStore>,
}

impl ConnectivityMonitor {
    pub fn new(api: Arc<dyn ServiceApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { api, store }
    }

    /// Probe `/health` and publish the result on the session.
    ///
    /// Any answer the service gives, even a degraded one, proves the address
    /// works, so it is persisted. Failures persist nothing.
    pub async fn probe(&self, session: &SharedSession) -> ConnectionStatus {
        session.update(|s| s.set_connection(ConnectionStatus::Checking));
        let base_url = self.api.base_url();

        let status = match self.api.health().await {
            Ok(report) => {
                if let Err(e) = self.store.set(API_URL_KEY, &base_url) {
                    tracing::warn!(error = %e, "Failed to persist service address");
                }
                ConnectionStatus::from_health(&report)
            }
            Err(e) => ConnectionStatus::Unreachable { reason: e.message },
        };

        tracing::info!(base_url = %base_url, status = %status, "Health probe finished");
        session.update(|s| s.set_connection(status.clone()));
        status
    }
}
