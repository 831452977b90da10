pub mod authz;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;
pub mod startup;

use config::SessionSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use services::{ApiClient, AuthClient};
use std::sync::Arc;

/// Shared application state containing the gateway clients
#[derive(Clone)]
pub struct AppState {
    pub api_client: Arc<ApiClient>,
    pub auth_client: Arc<AuthClient>,
    pub session_settings: SessionSettings,
    /// Absent when no recorder is installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(api_client: Arc<ApiClient>, session_settings: SessionSettings) -> Self {
        let auth_client = Arc::new(AuthClient::new(api_client.clone()));
        Self {
            api_client,
            auth_client,
            session_settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
