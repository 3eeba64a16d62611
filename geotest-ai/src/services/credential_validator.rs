//! Provider credential validation
//!
//! Format-only checks: no network call is made. A credential that fails here
//! puts its provider into mock mode.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::Credentials;
use crate::types::ProviderId;

static OPENAI_KEY: Lazy<Option<Regex>> = Lazy::new(|| build(r"^sk-(proj-)?[A-Za-z0-9_-]{20,}$"));
static ANTHROPIC_KEY: Lazy<Option<Regex>> = Lazy::new(|| build(r"^sk-ant-[A-Za-z0-9_-]{20,}$"));
static PERPLEXITY_KEY: Lazy<Option<Regex>> = Lazy::new(|| build(r"^pplx-[A-Za-z0-9]{20,}$"));
static GEMINI_KEY: Lazy<Option<Regex>> = Lazy::new(|| build(r"^AIza[A-Za-z0-9_-]{35}$"));

fn build(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| tracing::error!(pattern, error = %e, "Invalid credential pattern"))
        .ok()
}

/// Credential check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationResult {
    Valid,
    /// Present but wrong shape, or an obvious placeholder
    Invalid,
    /// Absent, empty or whitespace only
    Missing,
}

/// Which providers can run live
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub valid_providers: Vec<ProviderId>,
    pub invalid_providers: Vec<ProviderId>,
    pub valid_count: usize,
    pub required: usize,
    pub ready: bool,
}

pub struct CredentialValidator;

impl CredentialValidator {
    pub fn classify(provider: ProviderId, raw: Option<&str>) -> ValidationResult {
        let key = match raw.map(str::trim) {
            None | Some("") => return ValidationResult::Missing,
            Some(k) => k,
        };

        if key.to_ascii_lowercase().contains("placeholder") {
            return ValidationResult::Invalid;
        }

        let pattern = match provider {
            ProviderId::OpenAi => &*OPENAI_KEY,
            ProviderId::Anthropic => &*ANTHROPIC_KEY,
            ProviderId::Perplexity => &*PERPLEXITY_KEY,
            ProviderId::Gemini => &*GEMINI_KEY,
        };

        // Anthropic keys also start with "sk-"; keep them out of the OpenAI slot
        if provider == ProviderId::OpenAi && key.starts_with("sk-ant-") {
            return ValidationResult::Invalid;
        }

        if pattern.as_ref().is_some_and(|re| re.is_match(key)) {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid
        }
    }

    /// Whether `raw` looks like a usable credential for `provider`
    pub fn is_valid(provider: ProviderId, raw: Option<&str>) -> bool {
        Self::classify(provider, raw) == ValidationResult::Valid
    }

    /// Summarise the consensus providers' credentials
    ///
    /// `ready` when at least `required` providers have a valid key.
    pub fn readiness(credentials: &Credentials, required: usize) -> ReadinessReport {
        let (valid_providers, invalid_providers): (Vec<_>, Vec<_>) = ProviderId::CONSENSUS
            .iter()
            .copied()
            .partition(|id| Self::is_valid(*id, credentials.get(*id)));

        let valid_count = valid_providers.len();

        tracing::debug!(
            valid_count,
            required,
            invalid = ?invalid_providers,
            "Credential readiness evaluated"
        );

        ReadinessReport {
            valid_providers,
            invalid_providers,
            valid_count,
            required,
            ready: valid_count >= required,
        }
    }
}
