//! Analysis orchestrator
//!
//! One [`Orchestrator::run`] call is one analysis run:
//!
//! 1. Content fetch and visibility probe start together.
//! 2. Once the page text is available, every consensus provider is called.
//!    The calls share one task and are joined with an all-complete barrier;
//!    a progress ticker runs alongside until the barrier resolves.
//! 3. All results, failures included, go to the consensus engine.
//!
//! Run state (progress map, run id) is created per call. A cancelled run only
//! stops emitting progress: in-flight provider requests run to completion or
//! timeout.

pub mod progress;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use geotest_common::config::AnalysisSettings;
use geotest_common::events::{EventBus, GeoEvent};

use crate::config::Credentials;
use crate::consensus::{ConsensusEngine, ConsensusError};
use crate::providers::{ProviderClient, ProviderTransport};
use crate::services::content_fetcher::ContentFetcher;
use crate::services::response_cache::ResponseCache;
use crate::services::visibility_probe::{VisibilityProbe, VisibilityReport};
use crate::types::{AnalysisRequest, ConsensusResult, ProviderConfig, ProviderId, ProviderResult};

pub use progress::ProgressTracker;

/// Outcome of one orchestrator run
#[derive(Debug)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub consensus: Result<ConsensusResult, ConsensusError>,
    pub visibility: VisibilityReport,
    /// Final progress per consensus provider (100 once settled)
    pub progress: BTreeMap<ProviderId, u8>,
}

pub struct Orchestrator {
    clients: Vec<Arc<ProviderClient>>,
    probe: VisibilityProbe,
    fetcher: ContentFetcher,
    consensus: ConsensusEngine,
    cache: ResponseCache<ProviderResult>,
    event_bus: EventBus,
    progress_tick: Duration,
    progress_seed: Option<u64>,
}

impl Orchestrator {
    /// Build provider clients for every consensus and visibility provider
    ///
    /// Providers appearing in both sets share one client.
    pub fn new(
        settings: &AnalysisSettings,
        credentials: &Credentials,
        transport: Arc<dyn ProviderTransport>,
        event_bus: EventBus,
    ) -> Self {
        let mut clients: BTreeMap<ProviderId, Arc<ProviderClient>> = BTreeMap::new();
        for id in ProviderId::VISIBILITY {
            let client = ProviderClient::new(
                ProviderConfig::reference(id),
                credentials.get(id).map(str::to_string),
                Arc::clone(&transport),
                settings,
            );
            clients.insert(id, Arc::new(client));
        }

        let consensus_configs = ProviderConfig::consensus_set();
        let consensus_clients = consensus_configs
            .iter()
            .filter_map(|c| clients.get(&c.id).cloned())
            .collect();
        let probe_clients = ProviderId::VISIBILITY
            .iter()
            .filter_map(|id| clients.get(id).cloned())
            .collect();

        Self {
            clients: consensus_clients,
            probe: VisibilityProbe::new(probe_clients, settings.cache_ttl()),
            fetcher: ContentFetcher::new(settings.request_timeout(), settings.content_max_chars),
            consensus: ConsensusEngine::new(&consensus_configs),
            cache: ResponseCache::new(settings.cache_ttl()),
            event_bus,
            progress_tick: settings.progress_tick(),
            progress_seed: settings.mock_seed,
        }
    }

    /// Replace the content fetcher
    pub fn with_fetcher(mut self, fetcher: ContentFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Consensus providers in configuration order
    pub fn providers(&self) -> Vec<ProviderId> {
        self.clients.iter().map(|c| c.id()).collect()
    }

    /// Number of consensus providers with a usable credential
    pub fn live_provider_count(&self) -> usize {
        self.clients.iter().filter(|c| c.is_live()).count()
    }

    /// Run a full analysis for `request`
    ///
    /// Page content supplied in the request is used as is; otherwise it is
    /// fetched. The consensus error, if any, is returned inside the run.
    pub async fn run(&self, request: &AnalysisRequest) -> AnalysisRun {
        let run_id = Uuid::new_v4();
        let domain = request.domain();

        info!(run_id = %run_id, url = %request.url, "Analysis run started");

        self.event_bus.emit_lossy(GeoEvent::AnalysisStarted {
            run_id,
            url: request.url.clone(),
            providers: self
                .providers()
                .iter()
                .map(|id| id.display_name().to_string())
                .collect(),
            timestamp: chrono::Utc::now(),
        });

        let tracker = ProgressTracker::new(
            run_id,
            &self.providers(),
            self.progress_rng(),
            self.event_bus.clone(),
        );

        let scoring = async {
            let enriched = self.with_page_content(request).await;
            self.score_with_providers(run_id, &enriched, &tracker).await
        };

        let (consensus, visibility) = tokio::join!(scoring, self.probe.probe(&domain));

        match &consensus {
            Ok(result) => info!(
                run_id = %run_id,
                final_score = result.final_score,
                providers_used = result.metadata.providers_used,
                visibility_score = visibility.visibility_score,
                "Analysis run complete"
            ),
            Err(err) => warn!(run_id = %run_id, error = %err, "Analysis run produced no consensus"),
        }

        AnalysisRun {
            run_id,
            consensus,
            visibility,
            progress: tracker.snapshot(),
        }
    }

    /// Score `request` with every consensus provider and build the consensus
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<ConsensusResult, ConsensusError> {
        let run_id = Uuid::new_v4();
        let tracker = ProgressTracker::new(
            run_id,
            &self.providers(),
            self.progress_rng(),
            self.event_bus.clone(),
        );
        self.score_with_providers(run_id, request, &tracker).await
    }

    async fn with_page_content(&self, request: &AnalysisRequest) -> AnalysisRequest {
        match &request.content {
            Some(content) if !content.trim().is_empty() => request.clone(),
            _ => {
                let content = self.fetcher.fetch_content(&request.url).await;
                request.clone().with_content(content)
            }
        }
    }

    async fn score_with_providers(
        &self,
        run_id: Uuid,
        request: &AnalysisRequest,
        tracker: &ProgressTracker,
    ) -> Result<ConsensusResult, ConsensusError> {
        let calls = self
            .clients
            .iter()
            .map(|client| self.call_provider(run_id, client, request, tracker));
        let barrier = join_all(calls);
        tokio::pin!(barrier);

        let mut ticker = tokio::time::interval(self.progress_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately
        ticker.tick().await;

        let results = loop {
            tokio::select! {
                results = &mut barrier => break results,
                _ = ticker.tick() => tracker.tick(),
            }
        };

        self.consensus.build_consensus(results)
    }

    async fn call_provider(
        &self,
        run_id: Uuid,
        client: &ProviderClient,
        request: &AnalysisRequest,
        tracker: &ProgressTracker,
    ) -> ProviderResult {
        let provider = client.id();
        let start = Instant::now();
        let key = ResponseCache::<ProviderResult>::key("analyze", provider, &request.url);

        let result = match self.cache.get_or_fetch(&key, || client.analyze(request)).await {
            Ok(result) => result,
            Err(err) => {
                warn!(provider = %provider, error = %err, "Provider failed, recording failure");
                ProviderResult::failure(provider, err.to_string(), start.elapsed().as_millis() as u64)
            }
        };

        tracker.settle(provider);

        self.event_bus.emit_lossy(GeoEvent::ProviderCompleted {
            run_id,
            provider: provider.display_name().to_string(),
            success: result.success,
            score: result.score,
            elapsed_ms: start.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    fn progress_rng(&self) -> StdRng {
        match self.progress_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
