//! Visibility probe
//!
//! Asks each visibility provider what it already knows about a domain and
//! classifies the answer as visible (the model recognises the site) or not.
//! Providers without a valid credential produce a simulated answer.

use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::response_cache::ResponseCache;
use crate::providers::prompts::{truncate_chars, PromptTemplate};
use crate::providers::ProviderClient;
use crate::types::ProviderId;

const PROBE_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer factually and briefly. Do not guess about websites you do not recognise.";
const PROBE_MAX_TOKENS: u32 = 400;
const EXCERPT_CHARS: usize = 280;

/// Chance a simulated probe reports the domain as visible
const SIMULATED_VISIBLE_PROBABILITY: f64 = 0.6;

/// Phrases that mean the model does not recognise the site
const NEGATIVE_PHRASES: &[&str] = &[
    "don't have information",
    "do not have information",
    "don't have any information",
    "do not have any information",
    "no information",
    "not familiar",
    "unfamiliar with",
    "don't have specific",
    "do not have specific",
    "not aware of",
    "unable to find",
    "couldn't find",
    "could not find",
    "no specific information",
    "don't know",
    "do not know",
];

/// Second-level labels used under two-letter country codes (`co.uk`, `com.au`)
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu"];

/// One provider's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityResult {
    pub provider: ProviderId,
    pub visible: bool,
    /// Produced without calling the provider
    pub simulated: bool,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All providers' answers for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub domain: String,
    pub results: Vec<VisibilityResult>,
    pub visible_count: usize,
    /// Share of providers that recognised the domain, 0-100
    pub visibility_score: u8,
}

impl VisibilityReport {
    pub fn from_results(domain: impl Into<String>, results: Vec<VisibilityResult>) -> Self {
        let visible_count = results.iter().filter(|r| r.visible).count();
        let visibility_score = if results.is_empty() {
            0
        } else {
            ((visible_count as f64 / results.len() as f64) * 100.0).round() as u8
        };

        Self {
            domain: domain.into(),
            results,
            visible_count,
            visibility_score,
        }
    }
}

pub struct VisibilityProbe {
    clients: Vec<Arc<ProviderClient>>,
    cache: ResponseCache<VisibilityResult>,
}

impl VisibilityProbe {
    pub fn new(clients: Vec<Arc<ProviderClient>>, cache_ttl: Duration) -> Self {
        Self {
            clients,
            cache: ResponseCache::new(cache_ttl),
        }
    }

    /// Ask every provider about `domain` concurrently
    pub async fn probe(&self, domain: &str) -> VisibilityReport {
        let calls = self.clients.iter().map(|client| async move {
            let key = ResponseCache::<VisibilityResult>::key("visibility", client.id(), domain);
            match self.cache.get(&key) {
                Some(cached) => cached,
                None => {
                    let result = probe_one(client, domain).await;
                    // Errors are retried on the next run
                    if result.error.is_none() {
                        self.cache.set(key, result.clone());
                    }
                    result
                }
            }
        });

        let results = join_all(calls).await;
        let report = VisibilityReport::from_results(domain, results);

        debug!(
            domain,
            visible_count = report.visible_count,
            visibility_score = report.visibility_score,
            "Visibility probe complete"
        );

        report
    }
}

async fn probe_one(client: &ProviderClient, domain: &str) -> VisibilityResult {
    let provider = client.id();

    if !client.is_live() {
        return simulated_result(client, domain);
    }

    let prompt = PromptTemplate::build_visibility_prompt(domain);
    match client.complete(PROBE_SYSTEM_PROMPT, &prompt, PROBE_MAX_TOKENS).await {
        Ok(answer) => VisibilityResult {
            provider,
            visible: classify_answer(&answer, domain),
            simulated: false,
            excerpt: truncate_chars(answer.trim(), EXCERPT_CHARS),
            error: None,
        },
        Err(err) => {
            warn!(provider = %provider, error = %err, "Visibility probe failed");
            VisibilityResult {
                provider,
                visible: false,
                simulated: false,
                excerpt: String::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

fn simulated_result(client: &ProviderClient, domain: &str) -> VisibilityResult {
    let visible = client.with_mock_rng(|rng| rng.gen_bool(SIMULATED_VISIBLE_PROBABILITY));
    let excerpt = if visible {
        format!("{} appears to be an established website with a recognisable brand.", domain)
    } else {
        format!("I don't have information about {}.", domain)
    };

    VisibilityResult {
        provider: client.id(),
        visible,
        simulated: true,
        excerpt,
        error: None,
    }
}

/// Heuristic: the answer names the domain (or its brand) and does not
/// disclaim knowledge of it
pub fn classify_answer(answer: &str, domain: &str) -> bool {
    let answer = answer.to_lowercase();
    let domain = domain.to_lowercase();

    let brand = brand_label(&domain);
    let mentioned = answer.contains(&domain) || (brand.len() >= 3 && answer.contains(brand));
    let disclaimed = NEGATIVE_PHRASES.iter().any(|p| answer.contains(p));

    mentioned && !disclaimed
}

/// Registrable label of a host: `shop.example.co.uk` gives `example`
fn brand_label(host: &str) -> &str {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let suffix_len = match labels.as_slice() {
        [.., second, last]
            if labels.len() >= 3 && last.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(second) =>
        {
            2
        }
        [_, _, ..] => 1,
        _ => 0,
    };
    labels
        .len()
        .checked_sub(suffix_len + 1)
        .and_then(|i| labels.get(i))
        .copied()
        .unwrap_or_default()
}
