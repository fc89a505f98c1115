//! Core data models used throughout the recommendation engine.
//!
//! [`AuthorRecord`]s are the read-only input snapshot supplied by the data
//! provider. [`Candidate`] and [`RankedResult`] are transient values that flow
//! through retrieval, ranking, and reranking.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable external author identifier.
///
/// Upstream data keys authors by integers or strings. Integer-looking
/// strings are canonicalised to [`AuthorId::Int`] on every conversion path
/// ([`AuthorId::parse`], `From<&str>`, `From<String>`, and `Deserialize`),
/// so `"7"` and `7` name the same author inside one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum AuthorId {
    Int(i64),
    Str(String),
}

impl AuthorId {
    /// Parse a textual id, preferring the integer form.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => AuthorId::Int(n),
            Err(_) => AuthorId::Str(trimmed.to_string()),
        }
    }

    /// Convert a JSON scalar into an id. Numbers must be integral.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(AuthorId::Int),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(AuthorId::parse(s)),
            _ => None,
        }
    }

    /// The integer reading of this id, if it has one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AuthorId::Int(n) => Some(*n),
            AuthorId::Str(s) => s.trim().parse().ok(),
        }
    }

    /// The string form of this id.
    pub fn to_str_id(&self) -> AuthorId {
        AuthorId::Str(self.to_string())
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorId::Int(n) => write!(f, "{}", n),
            AuthorId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AuthorId {
    fn from(n: i64) -> Self {
        AuthorId::Int(n)
    }
}

impl From<&str> for AuthorId {
    fn from(s: &str) -> Self {
        AuthorId::parse(s)
    }
}

impl From<String> for AuthorId {
    fn from(s: String) -> Self {
        AuthorId::parse(&s)
    }
}

impl<'de> Deserialize<'de> for AuthorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => AuthorId::Int(n),
            Raw::Str(s) => AuthorId::parse(&s),
        })
    }
}

/// A publication as referenced from an author's record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicationRef {
    pub title: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    /// Co-author identifiers, including the record's own id.
    pub author_ids: Vec<AuthorId>,
}

/// One researcher profile from the `authors_data` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorRecord {
    pub id: AuthorId,
    pub name: String,
    pub interests: Vec<String>,
    pub bio: Option<String>,
    pub publications: Vec<PublicationRef>,
    /// Separately sourced co-author list. Informational only; the
    /// co-authorship graph is derived from `publications` alone.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coauthors: Vec<AuthorId>,
}

impl AuthorRecord {
    /// Most recent publication year, or `None` when no publication has one.
    pub fn last_publication_year(&self) -> Option<i32> {
        self.publications.iter().filter_map(|p| p.year).max()
    }

    /// Publications ordered newest first; undated ones sort last.
    pub fn recent_publications(&self) -> Vec<&PublicationRef> {
        let mut pubs: Vec<&PublicationRef> = self.publications.iter().collect();
        pubs.sort_by(|a, b| b.year.cmp(&a.year));
        pubs
    }
}

/// A validated `authors_data` payload keyed by author id.
///
/// `BTreeMap` keeps iteration order (and therefore index slot order)
/// deterministic for identical payloads.
pub type AuthorsData = BTreeMap<AuthorId, AuthorRecord>;

/// Output of retrieval, input to ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: AuthorId,
    /// Inner product with the query (cosine similarity for unit vectors).
    pub semantic_score: f64,
}

/// How a candidate relates to the requester in the co-authorship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionLabel {
    #[serde(rename = "Co-author")]
    CoAuthor,
    #[serde(rename = "2nd degree")]
    SecondDegree,
    #[serde(rename = "New connection")]
    NewConnection,
}

impl ConnectionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionLabel::CoAuthor => "Co-author",
            ConnectionLabel::SecondDegree => "2nd degree",
            ConnectionLabel::NewConnection => "New connection",
        }
    }
}

impl fmt::Display for ConnectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring breakdown for a ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub vector_score: f64,
    pub social_bonus: f64,
    pub time_decay: f64,
    #[serde(rename = "connection")]
    pub connection_label: ConnectionLabel,
    #[serde(rename = "last_year")]
    pub last_publication_year: Option<i32>,
}

/// A recommendation returned to callers.
///
/// Reranked and heuristic-only results share this shape; only
/// `llm_reasoning` distinguishes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub id: AuthorId,
    pub name: String,
    pub final_score: f64,
    /// 1-based position in the returned list.
    pub rank: usize,
    #[serde(rename = "details")]
    pub components: ScoreComponents,
    #[serde(rename = "reasoning", skip_serializing_if = "Option::is_none")]
    pub llm_reasoning: Option<String>,
}

/// A plain similarity hit, used by author-similarity and free-text search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorMatch {
    pub id: AuthorId,
    pub name: String,
    pub score: f64,
    pub interests: Vec<String>,
}

/// Renumber `rank` to match list position.
pub fn assign_ranks(results: &mut [RankedResult]) {
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }
}
