//! Consensus engine
//!
//! Reduces one [`ProviderResult`] per configured provider into a single
//! [`ConsensusResult`]. The reduction is a deterministic weighted average:
//!
//! - weight = 0.7 × confidence + 0.3 × static weight of the provider
//! - final score = Σ(score × weight) / Σ weight, rounded and clamped to 0-100
//! - reliability = coverage × mean confidence, discounted when scores diverge
//!
//! Failed results are kept in the output but never contribute to the score.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{
    clamp_score, ConsensusMetadata, ConsensusResult, ProviderConfig, ProviderId, ProviderResult,
};

pub const CONSENSUS_METHOD: &str = "hybrid-weighted-consensus";

const CONFIDENCE_SHARE: f64 = 0.7;
const STATIC_WEIGHT_SHARE: f64 = 0.3;

/// Static weight for a provider missing from the configuration
const DEFAULT_STATIC_WEIGHT: f64 = 1.0 / 3.0;

/// Score spread (max − min) above which providers are reported as conflicting
const CONFLICT_THRESHOLD: u8 = 20;

/// Score spread from which reliability is discounted
const RELIABILITY_SPREAD_LIMIT: u8 = 25;
const SPREAD_PENALTY: f64 = 0.85;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("No provider results to combine")]
    NoResults,

    #[error("All {0} providers failed")]
    NoSuccessfulResults(usize),
}

pub struct ConsensusEngine {
    static_weights: HashMap<ProviderId, f64>,
    configured_providers: usize,
}

impl ConsensusEngine {
    pub fn new(configs: &[ProviderConfig]) -> Self {
        Self {
            static_weights: configs.iter().map(|c| (c.id, c.static_weight)).collect(),
            configured_providers: configs.len(),
        }
    }

    fn static_weight(&self, id: ProviderId) -> f64 {
        self.static_weights
            .get(&id)
            .copied()
            .unwrap_or(DEFAULT_STATIC_WEIGHT)
    }

    /// Combine provider results into a consensus
    ///
    /// # Errors
    /// * [`ConsensusError::NoResults`] for empty input
    /// * [`ConsensusError::NoSuccessfulResults`] when every result failed
    pub fn build_consensus(
        &self,
        results: Vec<ProviderResult>,
    ) -> Result<ConsensusResult, ConsensusError> {
        if results.is_empty() {
            return Err(ConsensusError::NoResults);
        }

        let successful: Vec<&ProviderResult> = results.iter().filter(|r| r.success).collect();
        if successful.is_empty() {
            return Err(ConsensusError::NoSuccessfulResults(results.len()));
        }

        let final_score = self.weighted_score(&successful);
        let confidence =
            successful.iter().map(|r| r.confidence).sum::<f64>() / successful.len() as f64;

        let max = successful.iter().map(|r| r.score).max().unwrap_or(0);
        let min = successful.iter().map(|r| r.score).min().unwrap_or(0);
        let spread = max - min;

        // Coverage is measured against the configured set, or the input size if larger
        let expected = self.configured_providers.max(results.len());
        let coverage = successful.len() as f64 / expected as f64;
        let spread_factor = if spread < RELIABILITY_SPREAD_LIMIT {
            1.0
        } else {
            SPREAD_PENALTY
        };
        let reliability = round2((coverage * confidence * spread_factor).min(1.0));

        let failed = results.len() - successful.len();
        let consensus_insights = consensus_insights(successful.len(), results.len(), failed, spread);
        let conflicting_views = conflicting_views(&successful, spread);
        let recommended_actions = recommended_actions(failed);
        let total_processing_time_ms: u64 = results.iter().map(|r| r.processing_time_ms).sum();
        let providers_used = successful.len();

        info!(
            final_score,
            confidence,
            reliability,
            providers_used,
            failed,
            spread,
            "Consensus built"
        );

        Ok(ConsensusResult {
            final_score,
            confidence,
            provider_results: results,
            consensus_insights,
            conflicting_views,
            recommended_actions,
            metadata: ConsensusMetadata {
                providers_used,
                total_processing_time_ms,
                method: CONSENSUS_METHOD.to_string(),
                reliability,
            },
        })
    }

    fn weighted_score(&self, successful: &[&ProviderResult]) -> u8 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for result in successful {
            let weight = CONFIDENCE_SHARE * result.confidence
                + STATIC_WEIGHT_SHARE * self.static_weight(result.provider);
            debug!(provider = %result.provider, score = result.score, weight, "Consensus weight");
            weighted_sum += f64::from(result.score) * weight;
            weight_total += weight;
        }

        if weight_total > 0.0 {
            clamp_score(weighted_sum / weight_total)
        } else {
            let mean = successful.iter().map(|r| f64::from(r.score)).sum::<f64>()
                / successful.len() as f64;
            clamp_score(mean)
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn consensus_insights(successful: usize, total: usize, failed: usize, spread: u8) -> Vec<String> {
    let mut insights = vec![format!(
        "{} of {} AI providers returned a usable assessment",
        successful, total
    )];

    if failed > 0 {
        insights.push(format!(
            "{} provider(s) could not be reached; the score is based on the remaining {}",
            failed, successful
        ));
    }

    if spread <= CONFLICT_THRESHOLD {
        insights.push(format!(
            "Providers broadly agree (score spread of {} points)",
            spread
        ));
    }

    insights
}

fn conflicting_views(successful: &[&ProviderResult], spread: u8) -> Vec<String> {
    if spread <= CONFLICT_THRESHOLD {
        return Vec::new();
    }

    let mut views = vec![format!(
        "Provider scores differ by {} points; compare the individual assessments",
        spread
    )];

    if let (Some(high), Some(low)) = (
        successful.iter().max_by_key(|r| r.score),
        successful.iter().min_by_key(|r| r.score),
    ) {
        views.push(format!(
            "{} rated the page highest ({}), {} lowest ({})",
            high.provider, high.score, low.provider, low.score
        ));
    }

    views
}

fn recommended_actions(failed: usize) -> Vec<String> {
    let mut actions = vec![
        "Add structured data and cite authoritative sources for key claims".to_string(),
        "Review each provider's recommendations and address the ones they share".to_string(),
    ];

    if failed > 0 {
        actions.push(format!(
            "Re-run the analysis once the {} unavailable provider(s) respond",
            failed
        ));
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn ok(provider: ProviderId, score: f64, confidence: f64) -> ProviderResult {
        ProviderResult::success(provider, score, confidence, vec![], vec![], Value::Null, 100)
    }

    fn engine() -> ConsensusEngine {
        ConsensusEngine::new(&ProviderConfig::consensus_set())
    }

    #[test]
    fn test_weighted_fixture() {
        let consensus = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 80.0, 0.9),
                ok(ProviderId::Anthropic, 70.0, 0.8),
                ok(ProviderId::Perplexity, 60.0, 0.7),
            ])
            .unwrap();

        // weights 0.735 / 0.665 / 0.58 → 140.15 / 1.98 = 70.78
        assert_eq!(consensus.final_score, 71);
        assert!((consensus.confidence - 0.8).abs() < 1e-9);
        assert_eq!(consensus.metadata.reliability, 0.8);
        assert_eq!(consensus.metadata.providers_used, 3);
        assert_eq!(consensus.metadata.method, CONSENSUS_METHOD);
        assert_eq!(consensus.metadata.total_processing_time_ms, 300);
        assert_eq!(consensus.provider_results.len(), 3);
    }

    #[test]
    fn test_order_independent() {
        let a = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 88.0, 0.6),
                ok(ProviderId::Anthropic, 64.0, 0.95),
                ok(ProviderId::Perplexity, 73.0, 0.8),
            ])
            .unwrap();
        let b = engine()
            .build_consensus(vec![
                ok(ProviderId::Perplexity, 73.0, 0.8),
                ok(ProviderId::OpenAi, 88.0, 0.6),
                ok(ProviderId::Anthropic, 64.0, 0.95),
            ])
            .unwrap();

        assert_eq!(a.final_score, b.final_score);
        assert_eq!(a.metadata.reliability, b.metadata.reliability);
    }

    #[test]
    fn test_conflict_boundary() {
        let at_threshold = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 80.0, 0.8),
                ok(ProviderId::Anthropic, 60.0, 0.8),
            ])
            .unwrap();
        assert!(at_threshold.conflicting_views.is_empty());

        let above = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 81.0, 0.8),
                ok(ProviderId::Anthropic, 60.0, 0.8),
            ])
            .unwrap();
        assert!(!above.conflicting_views.is_empty());
    }

    #[test]
    fn test_reliability_by_success_count() {
        let failed = |id| ProviderResult::failure(id, "timeout", 30_000);

        let one = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 80.0, 0.9),
                failed(ProviderId::Anthropic),
                failed(ProviderId::Perplexity),
            ])
            .unwrap();
        assert_eq!(one.metadata.reliability, 0.3);
        assert_eq!(one.final_score, 80);

        let two = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 80.0, 0.9),
                ok(ProviderId::Anthropic, 80.0, 0.9),
                failed(ProviderId::Perplexity),
            ])
            .unwrap();
        assert_eq!(two.metadata.reliability, 0.6);

        let three = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 80.0, 0.9),
                ok(ProviderId::Anthropic, 80.0, 0.9),
                ok(ProviderId::Perplexity, 80.0, 0.9),
            ])
            .unwrap();
        assert_eq!(three.metadata.reliability, 0.9);
    }

    #[test]
    fn test_wide_spread_discounts_reliability() {
        let consensus = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 90.0, 1.0),
                ok(ProviderId::Anthropic, 65.0, 1.0),
                ok(ProviderId::Perplexity, 80.0, 1.0),
            ])
            .unwrap();
        assert_eq!(consensus.metadata.reliability, 0.85);
    }

    #[test]
    fn test_failures_excluded_from_score() {
        let consensus = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 90.0, 0.9),
                ProviderResult::failure(ProviderId::Anthropic, "network", 10),
                ok(ProviderId::Perplexity, 90.0, 0.9),
            ])
            .unwrap();
        assert_eq!(consensus.final_score, 90);
        assert_eq!(consensus.metadata.providers_used, 2);
        assert_eq!(consensus.provider_results.len(), 3);
        assert!(consensus.consensus_insights.iter().any(|i| i.contains("could not be reached")));
    }

    #[test]
    fn test_zero_weights_use_simple_mean() {
        let engine = ConsensusEngine::new(&[ProviderConfig {
            static_weight: 0.0,
            ..ProviderConfig::reference(ProviderId::Gemini)
        }]);
        let consensus = engine
            .build_consensus(vec![ok(ProviderId::Gemini, 55.0, 0.0)])
            .unwrap();
        assert_eq!(consensus.final_score, 55);
    }

    #[test]
    fn test_unknown_provider_gets_default_weight() {
        let engine = ConsensusEngine::new(&[]);
        let consensus = engine
            .build_consensus(vec![ok(ProviderId::Gemini, 70.0, 0.5), ok(ProviderId::OpenAi, 50.0, 0.5)])
            .unwrap();
        assert_eq!(consensus.final_score, 60);
    }

    #[test]
    fn test_errors() {
        assert_eq!(engine().build_consensus(vec![]).unwrap_err(), ConsensusError::NoResults);

        let err = engine()
            .build_consensus(vec![
                ProviderResult::failure(ProviderId::OpenAi, "a", 1),
                ProviderResult::failure(ProviderId::Anthropic, "b", 1),
            ])
            .unwrap_err();
        assert_eq!(err, ConsensusError::NoSuccessfulResults(2));
    }

    #[test]
    fn test_actions_independent_of_score() {
        let high = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 90.0, 0.8),
                ok(ProviderId::Anthropic, 90.0, 0.8),
                ok(ProviderId::Perplexity, 90.0, 0.8),
            ])
            .unwrap();
        let low = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 50.0, 0.8),
                ok(ProviderId::Anthropic, 50.0, 0.8),
                ok(ProviderId::Perplexity, 50.0, 0.8),
            ])
            .unwrap();

        assert_eq!(high.recommended_actions, low.recommended_actions);
        assert_eq!(high.consensus_insights, low.consensus_insights);
    }

    #[test]
    fn test_actions_interpolate_failed_count() {
        let consensus = engine()
            .build_consensus(vec![
                ok(ProviderId::OpenAi, 70.0, 0.8),
                ProviderResult::failure(ProviderId::Anthropic, "down", 1),
            ])
            .unwrap();
        assert!(consensus
            .recommended_actions
            .iter()
            .any(|a| a.contains("the 1 unavailable provider(s)")));
    }
}
