//! Prompt templates and structured-response parsing
//!
//! Every scoring prompt asks for a single JSON object:
//! `{"score": 0-100, "confidence": 0-1, "insights": [...], "recommendations": [...]}`

use serde::Deserialize;

use super::ProviderError;
use crate::types::{AnalysisRequest, ProviderConfig, ProviderId};

/// Confidence assumed when a live response omits it
pub const DEFAULT_LIVE_CONFIDENCE: f64 = 0.75;

pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt describing the provider's scoring role
    pub fn build_system_prompt(config: &ProviderConfig) -> String {
        format!(
            r#"You are an expert in Generative Engine Optimization (GEO): how likely AI assistants and answer engines are to cite, quote or recommend a web page.
Your specialty for this review: {}.

Respond with ONE JSON object and nothing else:
{{"score": <integer 0-100>, "confidence": <number 0.0-1.0>, "insights": [<short strings>], "recommendations": [<short actionable strings>]}}"#,
            config.specialty
        )
    }

    /// User prompt for a website analysis
    ///
    /// Scraped content is truncated to `content_max_chars` characters.
    pub fn build_analysis_prompt(
        config: &ProviderConfig,
        request: &AnalysisRequest,
        content_max_chars: usize,
    ) -> String {
        let content = request
            .content
            .as_deref()
            .map(|c| truncate_chars(c, content_max_chars))
            .unwrap_or_else(|| "(page content unavailable, judge from the URL and your own knowledge)".to_string());

        let focus = match config.id {
            ProviderId::OpenAi => {
                "Judge heading hierarchy, paragraph clarity, FAQ-style sections and whether key facts can be lifted into an AI answer verbatim."
            }
            ProviderId::Anthropic => {
                "Judge expertise, authorship, sourcing, factual precision and the trust signals an assistant would rely on before citing this page."
            }
            ProviderId::Perplexity => {
                "Judge how likely an answer engine is to surface this page as a cited source: topical coverage, freshness, statistics and quotable claims."
            }
            ProviderId::Gemini => {
                "Judge how well the brand and its entities are recognised and described consistently across the page."
            }
        };

        format!(
            r#"GEO READINESS ANALYSIS

URL: {}
LOCALE: {}
INDUSTRY: {}

FOCUS:
{}

PAGE CONTENT:
"""
{}
"""

Score the page from 0 (never cited by AI) to 100 (highly citable). Give 3-5 insights and 3-5 recommendations."#,
            request.url,
            request.locale.as_deref().unwrap_or("en"),
            request.industry.as_deref().unwrap_or("unspecified"),
            focus,
            content
        )
    }

    /// Visibility probe question: what does the model already know about a domain?
    pub fn build_visibility_prompt(domain: &str) -> String {
        format!(
            "What do you know about the website {domain}? Describe the company or organisation behind it, \
             what it offers and anything notable about it. If you have no information about {domain}, say so plainly."
        )
    }
}

/// Parsed scoring payload
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub score: f64,
    pub confidence: f64,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreEnvelope {
    score: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    insights: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Parse the JSON object out of a completion
///
/// Tolerates markdown code fences and prose around the object. A missing or
/// non-finite `score` is a structural failure.
pub fn parse_score_response(text: &str) -> Result<ParsedScore, ProviderError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ProviderError::Malformed("No JSON object in completion".to_string()))?;

    let envelope: ScoreEnvelope = serde_json::from_str(json)
        .map_err(|e| ProviderError::Malformed(format!("Invalid score JSON: {}", e)))?;

    let score = envelope
        .score
        .filter(|s| s.is_finite())
        .ok_or_else(|| ProviderError::Malformed("Missing field: score".to_string()))?;

    let confidence = envelope
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_LIVE_CONFIDENCE);

    Ok(ParsedScore {
        score,
        confidence,
        insights: clean_list(envelope.insights),
        recommendations: clean_list(envelope.recommendations),
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
