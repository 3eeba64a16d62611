//! Top-level website analysis
//!
//! Wraps the orchestrator and guarantees a report: when no provider produced
//! a usable result the caller gets a clearly labelled fallback instead of an
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use geotest_common::events::{EventBus, GeoEvent};
use geotest_common::Result;

use crate::orchestrator::Orchestrator;
use crate::services::visibility_probe::VisibilityReport;
use crate::types::{AnalysisRequest, ConsensusResult};

pub const FALLBACK_SCORE: u8 = 50;
pub const FALLBACK_NOTE: &str =
    "Live AI analysis was unavailable. This is a generic placeholder score, not an assessment of your site.";

/// Report returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteAnalysis {
    pub run_id: Uuid,
    pub url: String,
    pub domain: String,
    pub analyzed_at: DateTime<Utc>,
    pub overall_score: u8,
    pub grade: char,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusResult>,
    pub visibility: VisibilityReport,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Letter grade for a 0-100 score
pub fn grade_for(score: u8) -> char {
    match score {
        90..=u8::MAX => 'A',
        80..=89 => 'B',
        70..=79 => 'C',
        60..=69 => 'D',
        _ => 'F',
    }
}

pub struct AnalysisService {
    orchestrator: Orchestrator,
    event_bus: EventBus,
}

impl AnalysisService {
    pub fn new(orchestrator: Orchestrator, event_bus: EventBus) -> Self {
        Self {
            orchestrator,
            event_bus,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Analyse a website
    ///
    /// # Errors
    /// Only for invalid input (empty or non-http(s) URL). Provider and
    /// consensus failures are absorbed into the fallback report.
    pub async fn analyze_website(&self, request: AnalysisRequest) -> Result<WebsiteAnalysis> {
        request.validate()?;

        let run = self.orchestrator.run(&request).await;
        let domain = request.domain();

        let analysis = match run.consensus {
            Ok(consensus) => WebsiteAnalysis {
                run_id: run.run_id,
                url: request.url.clone(),
                domain,
                analyzed_at: Utc::now(),
                overall_score: consensus.final_score,
                grade: grade_for(consensus.final_score),
                consensus: Some(consensus),
                visibility: run.visibility,
                fallback: false,
                note: None,
            },
            Err(err) => {
                warn!(run_id = %run.run_id, url = %request.url, error = %err, "Serving fallback report");
                WebsiteAnalysis {
                    run_id: run.run_id,
                    url: request.url.clone(),
                    domain,
                    analyzed_at: Utc::now(),
                    overall_score: FALLBACK_SCORE,
                    grade: grade_for(FALLBACK_SCORE),
                    consensus: None,
                    visibility: run.visibility,
                    fallback: true,
                    note: Some(FALLBACK_NOTE.to_string()),
                }
            }
        };

        self.event_bus.emit_lossy(GeoEvent::AnalysisCompleted {
            run_id: analysis.run_id,
            url: analysis.url.clone(),
            final_score: analysis.consensus.as_ref().map(|c| c.final_score),
            fallback: analysis.fallback,
            timestamp: analysis.analyzed_at,
        });

        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade_for(100), 'A');
        assert_eq!(grade_for(90), 'A');
        assert_eq!(grade_for(89), 'B');
        assert_eq!(grade_for(80), 'B');
        assert_eq!(grade_for(79), 'C');
        assert_eq!(grade_for(70), 'C');
        assert_eq!(grade_for(69), 'D');
        assert_eq!(grade_for(60), 'D');
        assert_eq!(grade_for(59), 'F');
        assert_eq!(grade_for(0), 'F');
    }

    #[test]
    fn test_fallback_note_is_labelled() {
        assert!(FALLBACK_NOTE.starts_with("Live AI analysis was unavailable"));
        assert_eq!(grade_for(FALLBACK_SCORE), 'F');
    }
}
