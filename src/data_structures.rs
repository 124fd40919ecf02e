use crate::config::AppConfig;
use crate::upstream::{UpstreamClient, UpstreamError};
use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

// --- Type Aliases for Shared State ---

// One pooled HTTP client shared by every request
pub type SharedUpstream = Arc<UpstreamClient>;

pub type SharedServiceInfo = Arc<ServiceInfo>;

// --- Core Data Structures ---

#[derive(Clone, Debug)]
pub struct ServiceInfo {
    pub node_name: String,
    pub environment: String,
    pub started_at: Instant,
}

/// Immutable after start-up; handlers pull the parts they need via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub upstream: SharedUpstream,
    pub service: SharedServiceInfo,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            upstream: Arc::new(UpstreamClient::new(&config.upstream)?),
            service: Arc::new(ServiceInfo {
                node_name: config.node_name.clone(),
                environment: config.environment.clone(),
                started_at: Instant::now(),
            }),
        })
    }
}

impl FromRef<AppState> for SharedUpstream {
    fn from_ref(app_state: &AppState) -> SharedUpstream {
        app_state.upstream.clone()
    }
}

impl FromRef<AppState> for SharedServiceInfo {
    fn from_ref(app_state: &AppState) -> SharedServiceInfo {
        app_state.service.clone()
    }
}
