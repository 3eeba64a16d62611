//! geotest-ai library interface
//!
//! Scores a website's readiness to be cited by AI assistants (Generative
//! Engine Optimization) by asking several LLM providers for independent
//! opinions and combining them into one weighted consensus.

pub mod analysis;
pub mod api;
pub mod config;
pub mod consensus;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use geotest_common::config::AnalysisSettings;
use geotest_common::events::EventBus;

use crate::analysis::AnalysisService;
use crate::config::Credentials;
use crate::orchestrator::Orchestrator;
use crate::providers::ProviderTransport;
use crate::services::credential_validator::{CredentialValidator, ReadinessReport};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Credential readiness evaluated at startup
    pub readiness: Arc<ReadinessReport>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire the analysis pipeline from settings and resolved credentials
    pub fn new(
        settings: &AnalysisSettings,
        credentials: &Credentials,
        transport: Arc<dyn ProviderTransport>,
        event_bus: EventBus,
    ) -> Self {
        let readiness = CredentialValidator::readiness(credentials, settings.min_ready_providers);
        let orchestrator = Orchestrator::new(settings, credentials, transport, event_bus.clone());

        Self::from_service(
            AnalysisService::new(orchestrator, event_bus.clone()),
            readiness,
            event_bus,
        )
    }

    pub fn from_service(service: AnalysisService, readiness: ReadinessReport, event_bus: EventBus) -> Self {
        Self {
            service: Arc::new(service),
            event_bus,
            readiness: Arc::new(readiness),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::analysis_routes())
        .route("/analyze/events", get(api::analysis_event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
