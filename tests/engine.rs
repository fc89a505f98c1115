use anyhow::bail;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use scholar_match::embedding::{EmbeddingProvider, HashingProvider};
use scholar_match::engine::{EngineOptions, RecommendRequest, RecommendationEngine};
use scholar_match::error::Error;
use scholar_match::llm::LlmProvider;
use scholar_match::models::{AuthorId, AuthorRecord, AuthorsData, ConnectionLabel, PublicationRef};
use scholar_match::ranking::RecencyDecay;
use scholar_match::rerank::RerankOptions;

// ============ Stub providers ============

const VOCAB: &[&str] = &[
    "nlp",
    "transformer",
    "attention",
    "model",
    "biology",
    "robotic",
    "vision",
    "poison",
];

/// One axis per vocabulary word; unknown words contribute nothing.
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn embed_one(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; VOCAB.len()];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let lower = token.to_lowercase();
            let stem = lower.strip_suffix('s').unwrap_or(&lower);
            if let Some(axis) = VOCAB.iter().position(|w| *w == stem) {
                v[axis] += 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-stub"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.to_lowercase().contains("poison")) {
            bail!("embedding backend rejected input");
        }
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        bail!("503 Service Unavailable")
    }
}

struct HangingLlm;

#[async_trait]
impl LlmProvider for HangingLlm {
    fn model_name(&self) -> &str {
        "hanging"
    }
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("[]".to_string())
    }
}

struct CannedLlm(&'static str);

#[async_trait]
impl LlmProvider for CannedLlm {
    fn model_name(&self) -> &str {
        "canned"
    }
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

// ============ Fixtures ============

fn publication(title: &str, year: Option<i32>, ids: &[i64]) -> PublicationRef {
    PublicationRef {
        title: title.to_string(),
        abstract_text: None,
        year,
        author_ids: ids.iter().map(|&i| AuthorId::Int(i)).collect(),
    }
}

fn author(id: i64, name: &str, interests: &[&str], publications: Vec<PublicationRef>) -> AuthorRecord {
    AuthorRecord {
        id: AuthorId::Int(id),
        name: name.to_string(),
        interests: interests.iter().map(|s| s.to_string()).collect(),
        bio: None,
        publications,
        coauthors: vec![],
    }
}

fn data(records: Vec<AuthorRecord>) -> AuthorsData {
    records.into_iter().map(|a| (a.id.clone(), a)).collect()
}

/// A(1) co-authored with B(2); B co-authored with C(3); D(4) is a stranger.
/// B, C, and D have identical profile vectors.
fn social_corpus() -> AuthorsData {
    data(vec![
        author(1, "Ada", &["vision"], vec![publication("Joint work", Some(2024), &[1, 2])]),
        author(
            2,
            "Ben",
            &["robotics"],
            vec![
                publication("Joint work", Some(2024), &[1, 2]),
                publication("Another paper", Some(2024), &[2, 3]),
            ],
        ),
        author(3, "Cai", &["robotics"], vec![publication("Another paper", Some(2024), &[2, 3])]),
        author(4, "Dee", &["robotics"], vec![publication("Solo paper", Some(2024), &[4])]),
    ])
}

/// The three-author example from the scenario in the README.
fn nlp_corpus() -> AuthorsData {
    data(vec![
        author(1, "One", &["NLP"], vec![]),
        author(
            2,
            "Two",
            &["NLP", "Transformers"],
            vec![publication("Attention", Some(2023), &[2, 3])],
        ),
        author(
            3,
            "Three",
            &["Biology"],
            vec![publication("Attention", Some(2023), &[2, 3])],
        ),
    ])
}

fn options() -> EngineOptions {
    EngineOptions {
        current_year: Some(2025),
        rerank: RerankOptions {
            timeout: Duration::from_millis(200),
            ..RerankOptions::default()
        },
        ..EngineOptions::default()
    }
}

async fn engine_with(llm: Option<Arc<dyn LlmProvider>>, authors: AuthorsData) -> RecommendationEngine {
    let engine = RecommendationEngine::new(Arc::new(KeywordEmbedder), llm, options());
    engine.refresh(authors).await.unwrap();
    engine
}

async fn hashing_engine(authors: &AuthorsData) -> RecommendationEngine {
    let engine =
        RecommendationEngine::new(Arc::new(HashingProvider::new(128).unwrap()), None, options());
    engine.refresh(authors.clone()).await.unwrap();
    engine
}

fn request(requester: i64, query: &str, top_n: usize, use_llm: bool) -> RecommendRequest {
    RecommendRequest {
        top_n,
        use_llm,
        ..RecommendRequest::new(requester, query)
    }
}

fn ids(results: &[scholar_match::models::RankedResult]) -> Vec<AuthorId> {
    results.iter().map(|r| r.id.clone()).collect()
}

// ============ Properties ============

#[tokio::test]
async fn test_requester_never_recommended() {
    // The LLM tries to sneak the requester back in.
    let engine = engine_with(
        Some(Arc::new(CannedLlm(r#"[{"id": 1, "rank": 1}, {"id": 2, "rank": 2}]"#))),
        social_corpus(),
    )
    .await;
    for requester in 1..=4 {
        for use_llm in [false, true] {
            let out = engine
                .recommend(&request(requester, "robotics vision", 10, use_llm))
                .await
                .unwrap();
            assert!(!out.is_empty());
            assert!(
                out.iter().all(|r| r.id != AuthorId::Int(requester)),
                "requester {} leaked (use_llm={})",
                requester,
                use_llm
            );
        }
    }
}

#[tokio::test]
async fn test_social_proximity_orders_equal_vectors() {
    let engine = engine_with(None, social_corpus()).await;
    let out = engine
        .recommend(&request(1, "robotics", 3, false))
        .await
        .unwrap();

    assert_eq!(ids(&out), vec![AuthorId::Int(2), AuthorId::Int(3), AuthorId::Int(4)]);
    let vector_scores: Vec<f64> = out.iter().map(|r| r.components.vector_score).collect();
    assert!(vector_scores.iter().all(|s| (s - 1.0).abs() < 1e-6));
    assert_eq!(out[0].components.connection_label, ConnectionLabel::CoAuthor);
    assert_eq!(out[1].components.connection_label, ConnectionLabel::SecondDegree);
    assert_eq!(out[2].components.connection_label, ConnectionLabel::NewConnection);
    assert!((out[0].components.social_bonus - 0.25).abs() < 1e-12);
    assert!((out[1].components.social_bonus - 0.10).abs() < 1e-12);
    assert_eq!(out[2].components.social_bonus, 0.0);
}

#[test]
fn test_time_decay_non_increasing_with_age() {
    for decay in [RecencyDecay::standard(), RecencyDecay::strict()] {
        let mut previous = decay.factor(Some(2025), 2025);
        assert_eq!(previous, 1.0);
        for age in 1..40 {
            let f = decay.factor(Some(2025 - age), 2025);
            assert!(f <= previous, "decay rose at age {}", age);
            assert!(f > 0.0);
            previous = f;
        }
        assert_eq!(decay.factor(None, 2025), 1.0);
    }
}

#[tokio::test]
async fn test_recent_author_outranks_stale_twin() {
    let engine = engine_with(
        None,
        data(vec![
            author(1, "Req", &["vision"], vec![]),
            author(2, "Stale", &["robotics"], vec![publication("Old", Some(2005), &[2])]),
            author(3, "Fresh", &["robotics"], vec![publication("New", Some(2024), &[3])]),
            author(4, "Undated", &["robotics"], vec![publication("Undated", None, &[4])]),
        ]),
    )
    .await;
    let out = engine.recommend(&request(1, "robotics", 3, false)).await.unwrap();
    // Fresh and Undated tie on final and vector score; id breaks the tie.
    assert_eq!(ids(&out), vec![AuthorId::Int(3), AuthorId::Int(4), AuthorId::Int(2)]);
    assert_eq!(out[1].components.last_publication_year, None);
    assert_eq!(out[1].components.time_decay, 1.0);
    assert!((out[2].components.time_decay - 0.4).abs() < 1e-12);
}

#[tokio::test]
async fn test_identical_payload_gives_identical_orderings() {
    let corpus = data(
        (1..=30)
            .map(|i| {
                let interests: Vec<String> = (0..3).map(|j| format!("topic{}", (i * 7 + j) % 11)).collect();
                let refs: Vec<&str> = interests.iter().map(String::as_str).collect();
                author(i, &format!("Author {}", i), &refs, vec![])
            })
            .collect(),
    );
    let (a, b) = (hashing_engine(&corpus).await, hashing_engine(&corpus).await);
    for query in ["topic3 topic4", "topic10", "topic0 topic7 topic9"] {
        let left = a.search(query, 30).await.unwrap();
        let right = b.search(query, 30).await.unwrap();
        assert_eq!(left, right);
    }
}

#[tokio::test]
async fn test_own_vector_is_top_hit() {
    let engine = engine_with(None, nlp_corpus()).await;
    let snapshot = engine.snapshot().unwrap();
    for id in [AuthorId::Int(2), AuthorId::Int(3)] {
        let own = snapshot.index().vector(&id).unwrap().to_vec();
        let hits = snapshot.index().search_by_vector(&own, 3).unwrap();
        assert_eq!(hits[0].id, id);
        assert!((hits[0].semantic_score - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_failing_llm_matches_heuristic_path() {
    let engine = engine_with(Some(Arc::new(FailingLlm)), social_corpus()).await;
    let with_llm = engine.recommend(&request(1, "x robotics", 5, true)).await.unwrap();
    let without = engine.recommend(&request(1, "x robotics", 5, false)).await.unwrap();
    assert_eq!(with_llm, without);
    assert_eq!(with_llm.len(), 3);
}

#[tokio::test]
async fn test_hanging_llm_times_out_into_fallback() {
    let engine = engine_with(Some(Arc::new(HangingLlm)), social_corpus()).await;
    let started = std::time::Instant::now();
    let with_llm = engine.recommend(&request(1, "robotics", 2, true)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    let without = engine.recommend(&request(1, "robotics", 2, false)).await.unwrap();
    assert_eq!(with_llm, without);
}

#[tokio::test]
async fn test_string_id_from_llm_resolves_to_integer_author() {
    let corpus = data(vec![
        author(1, "Req", &["vision"], vec![]),
        author(7, "Seven", &["nlp"], vec![]),
        author(8, "Eight", &["nlp", "attention"], vec![]),
    ]);
    let engine = engine_with(
        Some(Arc::new(CannedLlm(
            r#"{"ranking": [{"id": "7", "rank": 1, "reasoning": "Direct NLP fit."}]}"#,
        ))),
        corpus,
    )
    .await;
    // Heuristically 8 leads; the model promotes 7.
    let out = engine
        .recommend(&request(1, "nlp attention", 2, true))
        .await
        .unwrap();
    assert_eq!(out[0].id, AuthorId::Int(7));
    assert_eq!(out[0].name, "Seven");
    assert_eq!(out[0].rank, 1);
    assert_eq!(out[0].llm_reasoning.as_deref(), Some("Direct NLP fit."));
    // Backfilled from the heuristic order, without reasoning.
    assert_eq!(out[1].id, AuthorId::Int(8));
    assert!(out[1].llm_reasoning.is_none());
}

#[tokio::test]
async fn test_transformer_query_prefers_nlp_author() {
    let engine = engine_with(None, nlp_corpus()).await;
    let out = engine
        .recommend(&request(1, "transformer attention models", 2, false))
        .await
        .unwrap();
    assert_eq!(ids(&out), vec![AuthorId::Int(2), AuthorId::Int(3)]);
    assert!(out[0].final_score > out[1].final_score);
    assert_eq!(out[0].components.last_publication_year, Some(2023));
}

#[tokio::test]
async fn test_unknown_requester_gets_no_social_bonus() {
    let engine = engine_with(None, social_corpus()).await;
    let out = engine.recommend(&request(999, "robotics", 4, false)).await.unwrap();
    assert_eq!(out.len(), 4);
    assert!(out
        .iter()
        .all(|r| r.components.connection_label == ConnectionLabel::NewConnection));
}

// ============ Snapshot lifecycle ============

#[tokio::test]
async fn test_refresh_swaps_without_touching_held_snapshot() {
    let engine = engine_with(None, nlp_corpus()).await;
    let held = engine.snapshot().unwrap();

    engine.refresh(social_corpus()).await.unwrap();

    assert_eq!(held.authors().len(), 3);
    assert_eq!(held.authors()[&AuthorId::Int(2)].name, "Two");
    assert_eq!(held.index().len(), 3);
    let current = engine.snapshot().unwrap();
    assert_eq!(current.authors().len(), 4);
    assert_eq!(current.authors()[&AuthorId::Int(2)].name, "Ben");
    assert!(current.generation() > held.generation());
}

#[tokio::test]
async fn test_failed_build_keeps_previous_snapshot() {
    let engine = engine_with(None, nlp_corpus()).await;
    let before = engine.snapshot().unwrap().generation();

    let mut poisoned = nlp_corpus();
    poisoned.insert(
        AuthorId::Int(9),
        author(9, "Nine", &["poison"], vec![]),
    );
    let err = engine.refresh(poisoned).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider(_)));

    let after = engine.snapshot().unwrap();
    assert_eq!(after.generation(), before);
    assert!(!after.authors().contains_key(&AuthorId::Int(9)));
}

#[tokio::test]
async fn test_queries_run_during_refresh() {
    let engine = Arc::new(engine_with(None, social_corpus()).await);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .recommend(&request(1 + (i % 4), "robotics vision", 3, false))
                .await
        }));
    }
    let refresher = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh(nlp_corpus()).await.map(|s| s.generation()) })
    };

    for task in tasks {
        let out = task.await.unwrap().unwrap();
        assert!(out.len() <= 3);
    }
    assert!(refresher.await.unwrap().unwrap() >= 2);
}

#[tokio::test]
async fn test_similar_authors_excludes_self_and_reports_unknown() {
    let engine = engine_with(None, social_corpus()).await;
    let similar = engine.similar_authors(&AuthorId::Int(2), 10).unwrap();
    assert_eq!(similar.len(), 3);
    assert!(similar.iter().all(|m| m.id != AuthorId::Int(2)));
    assert!(matches!(
        engine.similar_authors(&AuthorId::Str("ghost".into()), 3),
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_string_requester_matches_integer_keyed_author() {
    let engine = engine_with(None, social_corpus()).await;
    let request = RecommendRequest {
        top_n: 4,
        use_llm: false,
        ..RecommendRequest::new("1", "robotics")
    };
    assert_eq!(request.requester_id, AuthorId::Int(1));

    let out = engine.recommend(&request).await.unwrap();
    assert_eq!(ids(&out), vec![AuthorId::Int(2), AuthorId::Int(3), AuthorId::Int(4)]);
    assert_eq!(out[0].components.connection_label, ConnectionLabel::CoAuthor);
    assert_eq!(out[1].components.connection_label, ConnectionLabel::SecondDegree);

    let similar = engine.similar_authors(&"2".into(), 10).unwrap();
    assert!(similar.iter().all(|m| m.id != AuthorId::Int(2)));
}
