//! Recommendation façade.
//!
//! [`RecommendationEngine`] owns the active [`Snapshot`] and is the only entry
//! point callers need. A snapshot bundles the author records with the vector
//! index and co-authorship graph derived from them. It is built off to the
//! side and published with a single pointer swap; queries clone the `Arc` at
//! call start and never observe a half-built state.
//!
//! # Pipeline
//!
//! ```text
//! query ──▶ search_by_text(search_limit) ──▶ drop requester ──▶ heuristic score + sort
//!                                                                   │
//!                                        use_llm = false ◀──────────┤
//!                                         (top_n)                   ▼
//!                                                         LLM rerank (pool) ──▶ top_n
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::dataset::parse_authors_data;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::graph::CoauthorGraph;
use crate::index::VectorIndex;
use crate::llm::{create_llm, LlmProvider};
use crate::models::{AuthorId, AuthorMatch, AuthorsData, Candidate, RankedResult};
use crate::ranking::{HeuristicRanker, RecencyDecay, SocialWeights};
use crate::rerank::{heuristic_top, LlmReranker, RerankOptions};
use crate::vectorize::AuthorVectorizer;

/// One immutable generation of engine state.
#[derive(Debug)]
pub struct Snapshot {
    authors: AuthorsData,
    index: VectorIndex,
    graph: CoauthorGraph,
    built_at: DateTime<Utc>,
    generation: u64,
}

impl Snapshot {
    /// Vectorize every author, then derive the index and graph. Any
    /// embedding failure aborts the whole build.
    pub async fn build(
        authors: AuthorsData,
        provider: &dyn EmbeddingProvider,
        passage_prefix: &str,
        generation: u64,
    ) -> Result<Self> {
        let vectors = AuthorVectorizer::new(provider, passage_prefix)
            .vectorize_all(&authors)
            .await?;
        let index = VectorIndex::build(vectors)?;
        let graph = CoauthorGraph::build(&authors);

        Ok(Self {
            authors,
            index,
            graph,
            built_at: Utc::now(),
            generation,
        })
    }

    pub fn authors(&self) -> &AuthorsData {
        &self.authors
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn graph(&self) -> &CoauthorGraph {
        &self.graph
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn to_matches(&self, candidates: Vec<Candidate>) -> Vec<AuthorMatch> {
        candidates
            .into_iter()
            .map(|c| {
                let record = self.authors.get(&c.id);
                AuthorMatch {
                    name: record
                        .map(|a| a.name.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    interests: record.map(|a| a.interests.clone()).unwrap_or_default(),
                    id: c.id,
                    score: c.semantic_score,
                }
            })
            .collect()
    }
}

/// Parameters for [`RecommendationEngine::recommend`].
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub requester_id: AuthorId,
    pub query: String,
    pub top_n: usize,
    pub search_limit: usize,
    pub use_llm: bool,
}

impl RecommendRequest {
    pub fn new(requester_id: impl Into<AuthorId>, query: impl Into<String>) -> Self {
        Self {
            requester_id: requester_id.into(),
            query: query.into(),
            top_n: 5,
            search_limit: 50,
            use_llm: true,
        }
    }
}

/// Tunables shared by every query against the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub social: SocialWeights,
    pub decay: RecencyDecay,
    /// Year used for recency decay; the current UTC year when unset.
    pub current_year: Option<i32>,
    pub query_prefix: String,
    pub passage_prefix: String,
    pub rerank: RerankOptions,
}

pub struct RecommendationEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<LlmReranker>,
    options: EngineOptions,
    active: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl RecommendationEngine {
    /// Create an engine with no snapshot. Without an LLM provider every
    /// query takes the heuristic path.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
        options: EngineOptions,
    ) -> Self {
        let reranker = llm.map(|llm| LlmReranker::new(llm, options.rerank.clone()));
        Self {
            embedder,
            reranker,
            options,
            active: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Wire providers and tunables from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        if !config.embedding.is_enabled() {
            anyhow::bail!("[embedding] provider is disabled; no snapshot can be built");
        }
        let embedder = create_provider(&config.embedding)?;
        let llm = if config.llm.is_enabled() {
            Some(create_llm(&config.llm)?)
        } else {
            None
        };
        let options = EngineOptions {
            social: config.ranking.social_weights(),
            decay: config.ranking.decay.resolve()?,
            current_year: config.ranking.current_year,
            query_prefix: config.embedding.query_prefix.clone(),
            passage_prefix: config.embedding.passage_prefix.clone(),
            rerank: RerankOptions {
                pool_size: config.retrieval.rerank_pool,
                timeout: Duration::from_secs(config.llm.timeout_secs),
                ..RerankOptions::default()
            },
        };
        Ok(Self::new(embedder, llm, options))
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// The active snapshot, or [`Error::NotReady`] before the first build.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let guard = self.active.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or(Error::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Build a snapshot without publishing it.
    pub async fn build(&self, authors: AuthorsData) -> Result<Snapshot> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Snapshot::build(
            authors,
            self.embedder.as_ref(),
            &self.options.passage_prefix,
            generation,
        )
        .await
    }

    /// Build a new snapshot and swap it in. On failure the previous
    /// snapshot stays active. Concurrent refreshes run one at a time.
    pub async fn refresh(&self, authors: AuthorsData) -> Result<Arc<Snapshot>> {
        let _exclusive = self.refresh_lock.lock().await;
        let count = authors.len();
        let snapshot = Arc::new(self.build(authors).await?);

        {
            let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
            *active = Some(snapshot.clone());
        }

        info!(
            generation = snapshot.generation(),
            authors = count,
            edges = snapshot.graph().edge_count(),
            dims = snapshot.index().dims(),
            "published snapshot"
        );
        Ok(snapshot)
    }

    /// Validate a raw `authors_data` payload and refresh from it.
    pub async fn refresh_from_json(&self, payload: Value) -> Result<Arc<Snapshot>> {
        let authors = parse_authors_data(payload)?;
        self.refresh(authors).await
    }

    /// Rank other authors for `request.requester_id` against a research need.
    ///
    /// The requester never appears in the output. With `use_llm` the top of
    /// the heuristic ranking is reranked; a failed rerank returns the
    /// heuristic order unchanged.
    pub async fn recommend(&self, request: &RecommendRequest) -> Result<Vec<RankedResult>> {
        let snapshot = self.snapshot()?;
        if request.query.trim().is_empty() || request.top_n == 0 {
            return Ok(Vec::new());
        }

        let candidates = snapshot
            .index()
            .search_by_text(
                self.embedder.as_ref(),
                &self.prefixed_query(&request.query),
                request.search_limit,
            )
            .await?;

        let ranked = self.ranker().rank(
            &candidates,
            &request.requester_id,
            snapshot.graph(),
            snapshot.authors(),
        );
        debug!(
            requester = %request.requester_id,
            candidates = candidates.len(),
            ranked = ranked.len(),
            generation = snapshot.generation(),
            "heuristic ranking done"
        );

        match (&self.reranker, request.use_llm) {
            (Some(reranker), true) => Ok(reranker
                .rerank(snapshot.authors(), &ranked, &request.query, request.top_n)
                .await),
            _ => Ok(heuristic_top(&ranked, request.top_n)),
        }
    }

    /// Authors whose vectors are closest to `id`, excluding `id` itself.
    pub fn similar_authors(&self, id: &AuthorId, k: usize) -> Result<Vec<AuthorMatch>> {
        let snapshot = self.snapshot()?;
        let candidates = snapshot.index().search_similar_to_author(id, k)?;
        Ok(snapshot.to_matches(candidates))
    }

    /// Plain semantic search over all authors. Nobody is excluded.
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<AuthorMatch>> {
        let snapshot = self.snapshot()?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let candidates = snapshot
            .index()
            .search_by_text(self.embedder.as_ref(), &self.prefixed_query(text), k)
            .await?;
        Ok(snapshot.to_matches(candidates))
    }

    fn ranker(&self) -> HeuristicRanker {
        let current_year = self
            .options
            .current_year
            .unwrap_or_else(|| Utc::now().year());
        HeuristicRanker::new(self.options.social, self.options.decay, current_year)
    }

    fn prefixed_query(&self, text: &str) -> String {
        format!("{}{}", self.options.query_prefix, text)
    }
}
