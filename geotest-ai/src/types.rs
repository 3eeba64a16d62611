//! Core types shared by the provider clients, consensus engine and orchestrator
//!
//! Providers are identified by a stable [`ProviderId`] tag. Display names are
//! derived from the tag and only parsed back at the edges (first-token,
//! case-insensitive).

use geotest_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Provider identity and configuration
// ============================================================================

/// Stable provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Perplexity,
    Gemini,
}

impl ProviderId {
    /// Providers that take part in the scoring consensus
    pub const CONSENSUS: [ProviderId; 3] =
        [ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Perplexity];

    /// Providers asked by the visibility probe
    pub const VISIBILITY: [ProviderId; 4] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Perplexity,
        ProviderId::Gemini,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Perplexity => "Perplexity",
            ProviderId::Gemini => "Gemini",
        }
    }

    /// Environment variable holding this provider's credential
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OPENAI_API_KEY",
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::Perplexity => "PERPLEXITY_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Resolve a display name by case-insensitive first-token match
    ///
    /// `"Claude 3.5 Sonnet"`, `"anthropic"` and `"ANTHROPIC-api"` all map to
    /// [`ProviderId::Anthropic`].
    pub fn from_display_name(name: &str) -> Option<ProviderId> {
        let first = name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find(|token| !token.is_empty())?
            .to_ascii_lowercase();

        match first.as_str() {
            "openai" | "chatgpt" | "gpt" => Some(ProviderId::OpenAi),
            "anthropic" | "claude" => Some(ProviderId::Anthropic),
            "perplexity" | "pplx" | "sonar" => Some(ProviderId::Perplexity),
            "gemini" | "google" => Some(ProviderId::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Static provider configuration
///
/// Defined once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub name: String,
    pub endpoint: String,
    pub model: String,
    /// What this provider is asked to judge
    pub specialty: String,
    /// Configured authority in the consensus, in [0, 1]
    pub static_weight: f64,
}

impl ProviderConfig {
    /// Reference configuration for one provider
    pub fn reference(id: ProviderId) -> Self {
        let (endpoint, model, specialty, static_weight) = match id {
            ProviderId::OpenAi => (
                "https://api.openai.com/v1/chat/completions",
                "gpt-4o",
                "Content quality and structure",
                0.35,
            ),
            ProviderId::Anthropic => (
                "https://api.anthropic.com/v1/messages",
                "claude-3-5-sonnet-20241022",
                "Semantic authority and trust signals",
                0.35,
            ),
            ProviderId::Perplexity => (
                "https://api.perplexity.ai/chat/completions",
                "sonar",
                "Citation and answer-engine visibility",
                0.30,
            ),
            ProviderId::Gemini => (
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
                "gemini-1.5-flash",
                "Brand recognition",
                0.0,
            ),
        };

        Self {
            id,
            name: id.display_name().to_string(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            specialty: specialty.to_string(),
            static_weight,
        }
    }

    /// The three consensus providers (weights 0.35 / 0.35 / 0.30)
    pub fn consensus_set() -> Vec<ProviderConfig> {
        ProviderId::CONSENSUS
            .iter()
            .map(|id| ProviderConfig::reference(*id))
            .collect()
    }
}

// ============================================================================
// Request
// ============================================================================

/// Input to a provider analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
    /// Scraped page text (already truncated by the content fetcher)
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    /// Reject empty or non-http(s) URLs
    pub fn validate(&self) -> Result<()> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("URL must not be empty".to_string()));
        }

        let parsed = url::Url::parse(trimmed)
            .map_err(|e| Error::InvalidInput(format!("Invalid URL '{}': {}", trimmed, e)))?;

        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Ok(()),
            _ => Err(Error::InvalidInput(format!(
                "URL must be http(s) with a host: {}",
                trimmed
            ))),
        }
    }

    /// Host portion of the URL without a leading `www.`
    pub fn domain(&self) -> String {
        domain_of(&self.url)
    }
}

/// Host of a URL without a leading `www.`; falls back to the raw input
pub fn domain_of(raw: &str) -> String {
    url::Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

// ============================================================================
// Provider result
// ============================================================================

/// One provider's opinion about a URL
///
/// Built once per provider call and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: ProviderId,
    /// 0-100
    pub score: u8,
    /// 0.0-1.0
    pub confidence: f64,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    /// Provider-specific payload (raw response or mock marker)
    pub raw_data: serde_json::Value,
    pub processing_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Synthetic result produced in mock mode
    #[serde(default)]
    pub mock: bool,
}

impl ProviderResult {
    /// Successful result; score and confidence are clamped into range
    pub fn success(
        provider: ProviderId,
        score: f64,
        confidence: f64,
        insights: Vec<String>,
        recommendations: Vec<String>,
        raw_data: serde_json::Value,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            provider,
            score: clamp_score(score),
            confidence: clamp_unit(confidence),
            insights,
            recommendations,
            raw_data,
            processing_time_ms,
            success: true,
            error: None,
            mock: false,
        }
    }

    /// Failed result: score 0, confidence 0, success false
    pub fn failure(provider: ProviderId, error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            provider,
            score: 0,
            confidence: 0.0,
            insights: Vec::new(),
            recommendations: Vec::new(),
            raw_data: serde_json::Value::Null,
            processing_time_ms,
            success: false,
            error: Some(error.into()),
            mock: false,
        }
    }

    pub fn into_mock(mut self) -> Self {
        self.mock = true;
        self
    }
}

pub(crate) fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

// ============================================================================
// Consensus result
// ============================================================================

/// Aggregate of all provider opinions for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub final_score: u8,
    pub confidence: f64,
    /// One entry per configured provider, failures included
    pub provider_results: Vec<ProviderResult>,
    pub consensus_insights: Vec<String>,
    pub conflicting_views: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub metadata: ConsensusMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetadata {
    pub providers_used: usize,
    pub total_processing_time_ms: u64,
    pub method: String,
    /// 0.0-1.0, two decimals
    pub reliability: f64,
}
