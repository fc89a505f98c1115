//! Optional LLM reranking of the top heuristic results.
//!
//! The reranker forwards at most `pool_size` candidates, each summarised by
//! name, top interests, most recent publications, and connection label. The
//! model answers with a JSON list of `{id, rank, reasoning}`, best first.
//!
//! # Fallback contract
//!
//! Any failure (provider error, timeout, non-JSON output, a ranking that
//! resolves to no known candidate) yields the untouched heuristic top-`n`.
//! [`LlmReranker::rerank`] never returns an error. The provider call is not
//! retried.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::LlmProvider;
use crate::models::{assign_ranks, AuthorId, AuthorsData, RankedResult};

#[derive(Debug, Clone)]
pub struct RerankOptions {
    /// Heuristic results forwarded to the model.
    pub pool_size: usize,
    /// Upper bound on the provider call.
    pub timeout: Duration,
    pub max_interests: usize,
    pub max_publications: usize,
    pub abstract_chars: usize,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            pool_size: 15,
            timeout: Duration::from_secs(20),
            max_interests: 5,
            max_publications: 2,
            abstract_chars: 300,
        }
    }
}

/// One ranking entry as returned by the model, after id resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub id: AuthorId,
    pub reasoning: Option<String>,
}

pub struct LlmReranker {
    llm: Arc<dyn LlmProvider>,
    options: RerankOptions,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmProvider>, options: RerankOptions) -> Self {
        Self { llm, options }
    }

    /// Rerank `ranked` (already sorted by heuristic score) and return at most
    /// `top_n` results. Falls back to the heuristic order on any failure.
    pub async fn rerank(
        &self,
        authors: &AuthorsData,
        ranked: &[RankedResult],
        query_text: &str,
        top_n: usize,
    ) -> Vec<RankedResult> {
        match self.try_rerank(authors, ranked, query_text, top_n).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, model = self.llm.model_name(), "LLM rerank failed, using heuristic ranking");
                heuristic_top(ranked, top_n)
            }
        }
    }

    /// Like [`rerank`](Self::rerank) but surfaces the failure.
    pub async fn try_rerank(
        &self,
        authors: &AuthorsData,
        ranked: &[RankedResult],
        query_text: &str,
        top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        if top_n == 0 || ranked.is_empty() {
            return Ok(Vec::new());
        }
        let pool = &ranked[..ranked.len().min(self.options.pool_size)];
        let prompt = build_prompt(authors, pool, query_text, &self.options);

        let response = tokio::time::timeout(self.options.timeout, self.llm.complete(&prompt))
            .await
            .map_err(|_| {
                Error::rerank(format!("LLM call timed out after {:?}", self.options.timeout))
            })?
            .map_err(|e| Error::rerank(format!("{:#}", e)))?;

        let known: HashSet<AuthorId> = pool.iter().map(|r| r.id.clone()).collect();
        let verdicts = parse_ranking(&response, &known)?;
        if verdicts.is_empty() {
            return Err(Error::rerank("LLM ranking resolved to no known candidates"));
        }
        debug!(returned = verdicts.len(), pool = pool.len(), "LLM rerank succeeded");

        Ok(merge(pool, ranked, verdicts, top_n))
    }
}

/// Heuristic top-`n`, unchanged apart from rank numbering.
pub fn heuristic_top(ranked: &[RankedResult], top_n: usize) -> Vec<RankedResult> {
    let mut out: Vec<RankedResult> = ranked.iter().take(top_n).cloned().collect();
    assign_ranks(&mut out);
    out
}

/// Model picks first, then the remaining heuristic results in their
/// original order, truncated to `top_n`.
fn merge(
    pool: &[RankedResult],
    ranked: &[RankedResult],
    verdicts: Vec<Verdict>,
    top_n: usize,
) -> Vec<RankedResult> {
    let by_id: HashMap<&AuthorId, &RankedResult> = pool.iter().map(|r| (&r.id, r)).collect();
    let mut placed = HashSet::new();
    let mut out = Vec::with_capacity(top_n);

    for verdict in verdicts {
        if let Some(base) = by_id.get(&verdict.id) {
            let mut result = (*base).clone();
            result.llm_reasoning = verdict.reasoning;
            placed.insert(verdict.id);
            out.push(result);
        }
    }
    for r in ranked {
        if !placed.contains(&r.id) {
            out.push(r.clone());
        }
    }

    out.truncate(top_n);
    assign_ranks(&mut out);
    out
}

/// Build the ranking prompt for `pool`.
pub fn build_prompt(
    authors: &AuthorsData,
    pool: &[RankedResult],
    query_text: &str,
    options: &RerankOptions,
) -> String {
    let profiles: Vec<Value> = pool
        .iter()
        .map(|r| {
            let record = authors.get(&r.id);
            let interests: Vec<&str> = record
                .map(|a| {
                    a.interests
                        .iter()
                        .take(options.max_interests)
                        .map(String::as_str)
                        .collect()
                })
                .unwrap_or_default();
            let publications: Vec<Value> = record
                .map(|a| {
                    a.recent_publications()
                        .into_iter()
                        .take(options.max_publications)
                        .map(|p| {
                            serde_json::json!({
                                "title": p.title,
                                "year": p.year,
                                "abstract": p.abstract_text.as_deref().map(|t| truncate_chars(t, options.abstract_chars)),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            serde_json::json!({
                "id": r.id,
                "name": r.name,
                "interests": interests,
                "recent_publications": publications,
                "connection": r.components.connection_label.as_str(),
            })
        })
        .collect();

    let candidates = serde_json::to_string_pretty(&profiles).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are matching researchers for collaboration.\n\
         \n\
         Research need: \"{query}\"\n\
         \n\
         Candidates:\n\
         {candidates}\n\
         \n\
         Rank the candidates by how well their expertise fits the research need. \
         Judge semantic fit first. A \"Co-author\" connection is only a mild tie-breaker \
         between otherwise comparable candidates.\n\
         \n\
         Respond with strict JSON only, no prose and no code fences: an array ordered best first, \
         each element {{\"id\": <candidate id exactly as given>, \"rank\": <1-based position>, \
         \"reasoning\": <one sentence>}}.",
        query = query_text.replace('"', "'"),
        candidates = candidates,
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

/// Decode a model response into verdicts for known candidates.
///
/// Accepts a bare array or an object wrapping it under `ranking`, `results`,
/// or `recommendations`; tolerates markdown code fences. Entries whose id
/// cannot be resolved are dropped. Duplicate ids keep the first occurrence.
pub fn parse_ranking(response: &str, known: &HashSet<AuthorId>) -> Result<Vec<Verdict>> {
    let body = strip_code_fence(response);
    let json: Value = serde_json::from_str(body)
        .map_err(|e| Error::rerank(format!("LLM response is not JSON: {}", e)))?;

    let entries = match &json {
        Value::Array(items) => items,
        Value::Object(map) => ["ranking", "results", "recommendations"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .ok_or_else(|| Error::rerank("LLM response object has no ranking array"))?,
        _ => return Err(Error::rerank("LLM response is not a JSON array")),
    };

    let mut rows: Vec<(Option<f64>, Verdict)> = Vec::new();
    let mut seen = HashSet::new();
    for entry in entries {
        let Some(raw_id) = entry.get("id") else {
            continue;
        };
        let Some(id) = resolve_id(raw_id, known) else {
            debug!(id = %raw_id, "dropping unresolved LLM ranking entry");
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let rank = entry.get("rank").and_then(Value::as_f64);
        let reasoning = entry
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        rows.push((rank, Verdict { id, reasoning }));
    }

    if rows.iter().all(|(rank, _)| rank.is_some()) {
        rows.sort_by(|a, b| {
            a.0.unwrap_or(f64::MAX)
                .total_cmp(&b.0.unwrap_or(f64::MAX))
        });
    }

    Ok(rows.into_iter().map(|(_, v)| v).collect())
}

/// Resolve an id echoed by the model against the candidate set: exact match,
/// then integer cast, then string cast.
pub fn resolve_id(raw: &Value, known: &HashSet<AuthorId>) -> Option<AuthorId> {
    let exact = match raw {
        Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)).map(AuthorId::Int),
        Value::String(s) => Some(AuthorId::Str(s.trim().to_string())),
        _ => None,
    }?;
    if known.contains(&exact) {
        return Some(exact);
    }
    if let Some(n) = exact.as_int() {
        let as_int = AuthorId::Int(n);
        if known.contains(&as_int) {
            return Some(as_int);
        }
    }
    let as_str = exact.to_str_id();
    if known.contains(&as_str) {
        return Some(as_str);
    }
    None
}

/// `7.0` reads as `7`; fractional or out-of-range values do not.
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
