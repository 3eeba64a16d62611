//! Provider client
//!
//! One client per configured provider. Live calls go through the shared retry
//! wrapper and vendor adapter; without a usable credential the client answers
//! from its mock profile.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use geotest_common::config::AnalysisSettings;

use super::mock::mock_result;
use super::prompts::{parse_score_response, PromptTemplate};
use super::{retry_with_backoff, ProviderError, ProviderTransport, RetryPolicy, VendorAdapter};
use crate::services::credential_validator::CredentialValidator;
use crate::types::{AnalysisRequest, ProviderConfig, ProviderId, ProviderResult};

const ANALYSIS_MAX_TOKENS: u32 = 800;

/// Client for one LLM provider
pub struct ProviderClient {
    config: ProviderConfig,
    adapter: VendorAdapter,
    /// Only set when the credential passed format validation
    api_key: Option<String>,
    transport: Arc<dyn ProviderTransport>,
    policy: RetryPolicy,
    timeout: Duration,
    content_max_chars: usize,
    mock_on_transport_error: bool,
    rng: Mutex<StdRng>,
}

impl ProviderClient {
    /// Create a client; an invalid or absent credential puts it in mock mode
    pub fn new(
        config: ProviderConfig,
        api_key: Option<String>,
        transport: Arc<dyn ProviderTransport>,
        settings: &AnalysisSettings,
    ) -> Self {
        let api_key = api_key.filter(|k| CredentialValidator::is_valid(config.id, Some(k)));
        let rng = seeded_rng(config.id, settings.mock_seed);

        if api_key.is_none() {
            info!(provider = %config.id, "No valid credential, provider runs in mock mode");
        }

        Self {
            adapter: VendorAdapter::for_provider(config.id),
            config,
            api_key,
            transport,
            policy: RetryPolicy::from_settings(settings),
            timeout: settings.request_timeout(),
            content_max_chars: settings.content_max_chars,
            mock_on_transport_error: settings.mock_on_transport_error,
            rng: Mutex::new(rng),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.config.id
    }

    /// Whether calls go to the vendor API
    pub fn is_live(&self) -> bool {
        self.api_key.is_some()
    }

    /// Score a page
    ///
    /// Returns `Err` only for transport failures that survived every retry
    /// (and only when `mock_on_transport_error` is off). Malformed responses
    /// and missing credentials produce a mock result.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<ProviderResult, ProviderError> {
        let start = Instant::now();

        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(self.mock("no valid credential", start));
        };

        let system_prompt = PromptTemplate::build_system_prompt(&self.config);
        let user_prompt =
            PromptTemplate::build_analysis_prompt(&self.config, request, self.content_max_chars);
        let vendor_request = self.adapter.build_request(
            &self.config,
            api_key,
            &system_prompt,
            &user_prompt,
            ANALYSIS_MAX_TOKENS,
        );

        let transport = &self.transport;
        let adapter = self.adapter;
        let vreq = &vendor_request;
        let timeout = self.timeout;

        let outcome = retry_with_backoff(&self.config.name, &self.policy, || async move {
            let body = transport.post_json(vreq, timeout).await?;
            let text = adapter.extract_text(&body)?;
            let parsed = parse_score_response(&text)?;
            Ok((body, parsed))
        })
        .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((body, parsed)) => {
                debug!(
                    provider = %self.config.id,
                    score = parsed.score,
                    elapsed_ms,
                    "Live analysis complete"
                );
                Ok(ProviderResult::success(
                    self.config.id,
                    parsed.score,
                    parsed.confidence,
                    parsed.insights,
                    parsed.recommendations,
                    json!({ "mode": "live", "model": self.config.model, "response": body }),
                    elapsed_ms,
                ))
            }
            Err(err) if err.is_malformed() => {
                warn!(provider = %self.config.id, error = %err, "Unusable response, using mock result");
                Ok(self.mock(&err.to_string(), start))
            }
            Err(err) if self.mock_on_transport_error => {
                warn!(provider = %self.config.id, error = %err, "Transport failure, using mock result");
                Ok(self.mock(&err.to_string(), start))
            }
            Err(err) => Err(err),
        }
    }

    /// Free-text completion for a system + user prompt pair
    ///
    /// Requires a live credential; transport and empty-response errors are
    /// retried like [`ProviderClient::analyze`] and then returned.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Malformed(format!("{} has no valid credential", self.config.name))
        })?;

        let vendor_request =
            self.adapter
                .build_request(&self.config, api_key, system_prompt, user_prompt, max_tokens);

        let transport = &self.transport;
        let adapter = self.adapter;
        let vreq = &vendor_request;
        let timeout = self.timeout;

        retry_with_backoff(&self.config.name, &self.policy, || async move {
            let body = transport.post_json(vreq, timeout).await?;
            adapter.extract_text(&body)
        })
        .await
    }

    /// Run `f` with this client's mock randomness source
    pub(crate) fn with_mock_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    fn mock(&self, reason: &str, start: Instant) -> ProviderResult {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.with_mock_rng(|rng| mock_result(self.config.id, rng, reason, elapsed_ms))
    }
}

/// Seeded generator when `mock_seed` is set, salted per provider so clients
/// sharing a seed still draw independent sequences
pub(crate) fn seeded_rng(id: ProviderId, seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ provider_salt(id)),
        None => StdRng::from_entropy(),
    }
}

fn provider_salt(id: ProviderId) -> u64 {
    match id {
        ProviderId::OpenAi => 0x9e37_79b9_7f4a_7c15,
        ProviderId::Anthropic => 0xbf58_476d_1ce4_e5b9,
        ProviderId::Perplexity => 0x94d0_49bb_1331_11eb,
        ProviderId::Gemini => 0x2545_f491_4f6c_dd1d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::VendorRequest;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    const OPENAI_KEY: &str = "sk-proj-abcdefghijklmnopqrstuvwxyz012345";

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<Value, ProviderError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn post_json(&self, _request: &VendorRequest, _timeout: Duration) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    fn fast_settings() -> AnalysisSettings {
        AnalysisSettings {
            max_retries: 3,
            backoff_base_ms: 1,
            mock_seed: Some(42),
            ..Default::default()
        }
    }

    fn openai_completion(content: &str) -> Value {
        json!({ "choices": [ { "message": { "content": content } } ] })
    }

    #[tokio::test]
    async fn test_missing_credential_uses_mock() {
        let transport = ScriptedTransport::new(vec![Ok(Value::Null)]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::Anthropic),
            None,
            transport.clone(),
            &fast_settings(),
        );

        assert!(!client.is_live());
        let result = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap();
        assert!(result.mock);
        assert!((70..=88).contains(&result.score));
        assert_eq!(result.confidence, 0.88);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_placeholder_credential_uses_mock() {
        let transport = ScriptedTransport::new(vec![Ok(Value::Null)]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some("sk-placeholder-key-goes-here-xxxxxxxx".to_string()),
            transport,
            &fast_settings(),
        );
        assert!(!client.is_live());
    }

    #[tokio::test]
    async fn test_live_success() {
        let transport = ScriptedTransport::new(vec![Ok(openai_completion(
            r#"{"score": 91, "confidence": 0.93, "insights": ["clear"], "recommendations": ["add faq"]}"#,
        ))]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some(OPENAI_KEY.to_string()),
            transport.clone(),
            &fast_settings(),
        );

        let result = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap();
        assert!(result.success);
        assert!(!result.mock);
        assert_eq!(result.score, 91);
        assert_eq!(result.confidence, 0.93);
        assert_eq!(result.raw_data["mode"], "live");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(ProviderError::Http(503, "busy".to_string())),
            Ok(openai_completion(r#"{"score": 77}"#)),
        ]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some(OPENAI_KEY.to_string()),
            transport.clone(),
            &fast_settings(),
        );

        let result = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap();
        assert_eq!(result.score, 77);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_returned() {
        let transport = ScriptedTransport::new(vec![Err(ProviderError::Network("refused".to_string()))]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some(OPENAI_KEY.to_string()),
            transport.clone(),
            &fast_settings(),
        );

        let err = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap_err();
        assert_eq!(err, ProviderError::Network("refused".to_string()));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_downgrades_when_configured() {
        let transport = ScriptedTransport::new(vec![Err(ProviderError::Timeout(30_000))]);
        let settings = AnalysisSettings {
            mock_on_transport_error: true,
            ..fast_settings()
        };
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some(OPENAI_KEY.to_string()),
            transport,
            &settings,
        );

        let result = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap();
        assert!(result.mock);
        assert!((65..=85).contains(&result.score));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back_to_mock() {
        let transport = ScriptedTransport::new(vec![Ok(openai_completion("I cannot score this page."))]);
        let client = ProviderClient::new(
            ProviderConfig::reference(ProviderId::OpenAi),
            Some(OPENAI_KEY.to_string()),
            transport.clone(),
            &fast_settings(),
        );

        let result = client.analyze(&AnalysisRequest::new("https://example.com")).await.unwrap();
        assert!(result.mock);
        assert!(result.success);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_seeded_clients_are_reproducible() {
        let make = || {
            ProviderClient::new(
                ProviderConfig::reference(ProviderId::Perplexity),
                None,
                ScriptedTransport::new(vec![Ok(Value::Null)]),
                &fast_settings(),
            )
        };
        let request = AnalysisRequest::new("https://example.com");

        let a = make().analyze(&request).await.unwrap();
        let b = make().analyze(&request).await.unwrap();
        assert_eq!(a.score, b.score);
    }
}
