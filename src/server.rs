//! JSON HTTP surface for the recommendation engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, and active snapshot info |
//! | `GET`  | `/recommendations?user_id&q&top_n&search_limit&use_llm` | Ranked introductions for a user |
//! | `GET`  | `/authors/{id}/similar?k` | Nearest authors by profile vector |
//! | `GET`  | `/search?q&k` | Plain semantic search over authors |
//! | `POST` | `/refresh` | Rebuild in the background from a JSON body or `[data].authors_path` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "Engine not ready: no snapshot has been built yet" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `not_ready` (503),
//! `embedding_error` (502), `internal` (500).

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::dataset::{load_authors_file, parse_authors_data};
use crate::engine::{RecommendRequest, RecommendationEngine};
use crate::error::Error;
use crate::models::{AuthorId, AuthorMatch, RankedResult};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: Arc<RecommendationEngine>,
}

/// Build the engine from `config`, publish the first snapshot from
/// `[data].authors_path`, and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(RecommendationEngine::from_config(config)?);
    let authors = load_authors_file(&config.data.authors_path)?;
    engine.refresh(authors).await?;

    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()), engine);

    info!(bind = %bind_addr, "recommendation server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes over an already constructed engine.
pub fn router(config: Arc<Config>, engine: Arc<RecommendationEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/recommendations", get(handle_recommendations))
        .route("/authors/{id}/similar", get(handle_similar))
        .route("/search", get(handle_search))
        .route("/refresh", post(handle_refresh))
        .layer(cors)
        .with_state(AppState { config, engine })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::MalformedInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::EmbeddingProvider(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ready: bool,
    embedding_model: String,
    reranker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    built_at: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.engine.snapshot().ok();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ready: snapshot.is_some(),
        embedding_model: state.engine.embedder().model_name().to_string(),
        reranker: state.engine.has_reranker(),
        generation: snapshot.as_ref().map(|s| s.generation()),
        authors: snapshot.as_ref().map(|s| s.authors().len()),
        built_at: snapshot.as_ref().map(|s| s.built_at().to_rfc3339()),
    })
}

// ============ GET /recommendations ============

#[derive(Deserialize)]
struct RecommendParams {
    user_id: Option<String>,
    q: Option<String>,
    top_n: Option<usize>,
    search_limit: Option<usize>,
    use_llm: Option<bool>,
}

#[derive(Serialize)]
struct RecommendResponse {
    user_id: AuthorId,
    query: String,
    results: Vec<RankedResult>,
}

async fn handle_recommendations(
    State(state): State<AppState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
) -> Result<Json<RecommendResponse>, AppError> {
    let Query(params) = params?;
    let user_id = params
        .user_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(AuthorId::parse)
        .ok_or_else(|| bad_request("user_id is required"))?;
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("q must not be empty"))?;

    let retrieval = &state.config.retrieval;
    let request = RecommendRequest {
        requester_id: user_id.clone(),
        query: query.clone(),
        top_n: params.top_n.unwrap_or(retrieval.top_n),
        search_limit: params.search_limit.unwrap_or(retrieval.search_limit),
        use_llm: params.use_llm.unwrap_or(retrieval.use_llm),
    };
    if request.top_n == 0 || request.search_limit == 0 {
        return Err(bad_request("top_n and search_limit must be >= 1"));
    }

    let results = state.engine.recommend(&request).await?;
    Ok(Json(RecommendResponse {
        user_id,
        query,
        results,
    }))
}

// ============ GET /authors/{id}/similar ============

#[derive(Deserialize)]
struct SimilarParams {
    k: Option<usize>,
}

#[derive(Serialize)]
struct MatchesResponse {
    results: Vec<AuthorMatch>,
}

async fn handle_similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<SimilarParams>, QueryRejection>,
) -> Result<Json<MatchesResponse>, AppError> {
    let Query(params) = params?;
    let k = params.k.unwrap_or(state.config.retrieval.top_n);
    let results = state.engine.similar_authors(&AuthorId::parse(&id), k)?;
    Ok(Json(MatchesResponse { results }))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    k: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<MatchesResponse>, AppError> {
    let Query(params) = params?;
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("q must not be empty"))?;
    let k = params.k.unwrap_or(state.config.retrieval.top_n);
    let results = state.engine.search(&q, k).await?;
    Ok(Json(MatchesResponse { results }))
}

// ============ POST /refresh ============

#[derive(Serialize)]
struct RefreshAccepted {
    status: &'static str,
    source: &'static str,
}

/// Validate the payload synchronously, then rebuild in the background.
/// An empty body reloads `[data].authors_path`.
async fn handle_refresh(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RefreshAccepted>), AppError> {
    let (authors, source) = if body.iter().all(u8::is_ascii_whitespace) {
        let path = state.config.data.authors_path.clone();
        let authors = tokio::task::spawn_blocking(move || load_authors_file(&path))
            .await
            .map_err(|e| AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: format!("payload load task failed: {}", e),
            })??;
        (authors, "file")
    } else {
        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?;
        (parse_authors_data(payload)?, "body")
    };

    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.refresh(authors).await {
            error!(error = %e, "background refresh failed; previous snapshot stays active");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            status: "accepted",
            source,
        }),
    ))
}
