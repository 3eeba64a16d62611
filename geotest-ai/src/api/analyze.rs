//! Analysis endpoints
//!
//! - `POST /analyze`: run a full analysis and return the report
//! - `GET /providers/readiness`: which providers have usable credentials

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::analysis::WebsiteAnalysis;
use crate::error::{ApiError, ApiResult};
use crate::services::credential_validator::ReadinessReport;
use crate::types::AnalysisRequest;
use crate::AppState;

/// POST /analyze request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl From<AnalyzeRequest> for AnalysisRequest {
    fn from(body: AnalyzeRequest) -> Self {
        AnalysisRequest {
            url: body.url.trim().to_string(),
            content: None,
            locale: body.locale.filter(|l| !l.trim().is_empty()),
            industry: body.industry.filter(|i| !i.trim().is_empty()),
        }
    }
}

/// POST /analyze
pub async fn analyze_website(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> ApiResult<Json<WebsiteAnalysis>> {
    if body.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    info!(url = %body.url, "Analysis requested");

    let analysis = state.service.analyze_website(body.into()).await?;

    if let Some(note) = &analysis.note {
        *state.last_error.write().await = Some(format!("{}: {}", analysis.url, note));
    }

    Ok(Json(analysis))
}

/// GET /providers/readiness
pub async fn provider_readiness(State(state): State<AppState>) -> Json<ReadinessReport> {
    Json(state.readiness.as_ref().clone())
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze_website))
        .route("/providers/readiness", get(provider_readiness))
}
