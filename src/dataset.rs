//! Parsing and validation of the `authors_data` payload.
//!
//! The data provider hands over a loosely-typed JSON document. This module is
//! the only place that looks at its raw shape; everything downstream works
//! with [`AuthorRecord`]s.
//!
//! Accepted shapes:
//!
//! ```json
//! { "7": { "name": "...", "interests": [], "publications": [] } }
//! { "7": { "combined": { "name": "...", ... } } }
//! [ { "id": 7, "name": "...", ... } ]
//! ```
//!
//! `name` and publication `title` are required. Missing `year`, `abstract`,
//! `bio`, `interests`, or `publications` default to absent/empty.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{AuthorId, AuthorRecord, AuthorsData, PublicationRef};

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<Value>,
    #[serde(default)]
    interests: Option<Vec<Value>>,
    #[serde(default)]
    bio: Option<Value>,
    #[serde(default)]
    publications: Option<Vec<Value>>,
    #[serde(default)]
    coauthors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawPublication {
    title: Option<Value>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<Value>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default, alias = "authors")]
    author_ids: Option<Vec<Value>>,
}

/// Read and validate an `authors_data` JSON file.
pub fn load_authors_file(path: &Path) -> Result<AuthorsData> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    parse_authors_data(value)
}

/// Validate a raw `authors_data` payload.
pub fn parse_authors_data(value: Value) -> Result<AuthorsData> {
    let mut authors = AuthorsData::new();

    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                let id = AuthorId::parse(&key);
                insert_unique(&mut authors, parse_author(id, entry)?)?;
            }
        }
        Value::Array(items) => {
            for (pos, entry) in items.into_iter().enumerate() {
                let id = entry
                    .get("id")
                    .and_then(AuthorId::from_json)
                    .ok_or_else(|| {
                        Error::malformed(format!("author at position {} has no usable id", pos))
                    })?;
                insert_unique(&mut authors, parse_author(id, entry)?)?;
            }
        }
        _ => {
            return Err(Error::malformed(
                "authors_data must be a JSON object keyed by author id or an array of authors",
            ))
        }
    }

    Ok(authors)
}

fn insert_unique(authors: &mut AuthorsData, record: AuthorRecord) -> Result<()> {
    if authors.contains_key(&record.id) {
        return Err(Error::malformed(format!(
            "duplicate author id {}",
            record.id
        )));
    }
    authors.insert(record.id.clone(), record);
    Ok(())
}

fn parse_author(id: AuthorId, mut entry: Value) -> Result<AuthorRecord> {
    if let Some(inner) = entry.get_mut("combined") {
        if inner.is_object() {
            entry = inner.take();
        }
    }
    if !entry.is_object() {
        return Err(Error::malformed(format!("author {}: entry is not an object", id)));
    }

    let raw: RawAuthor = serde_json::from_value(entry)
        .map_err(|e| Error::malformed(format!("author {}: {}", id, e)))?;

    let name = raw
        .name
        .as_ref()
        .and_then(non_blank_string)
        .ok_or_else(|| Error::malformed(format!("author {}: missing name", id)))?;

    let interests = raw
        .interests
        .unwrap_or_default()
        .iter()
        .filter_map(non_blank_string)
        .collect();

    let bio = raw.bio.as_ref().and_then(non_blank_string);

    let mut publications = Vec::new();
    for (pos, value) in raw.publications.unwrap_or_default().into_iter().enumerate() {
        publications.push(parse_publication(&id, pos, value)?);
    }

    let coauthors = raw
        .coauthors
        .unwrap_or_default()
        .iter()
        .filter_map(AuthorId::from_json)
        .collect();

    Ok(AuthorRecord {
        id,
        name,
        interests,
        bio,
        publications,
        coauthors,
    })
}

fn parse_publication(author: &AuthorId, pos: usize, value: Value) -> Result<PublicationRef> {
    let raw: RawPublication = serde_json::from_value(value).map_err(|e| {
        Error::malformed(format!("author {}: publication {}: {}", author, pos, e))
    })?;

    let title = match raw.title {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => {
            return Err(Error::malformed(format!(
                "author {}: publication {}: missing title",
                author, pos
            )))
        }
    };

    Ok(PublicationRef {
        title,
        abstract_text: raw.abstract_text.as_ref().and_then(non_blank_string),
        year: raw.year.as_ref().and_then(lenient_year),
        author_ids: raw
            .author_ids
            .unwrap_or_default()
            .iter()
            .filter_map(AuthorId::from_json)
            .collect(),
    })
}

fn non_blank_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Integer years or numeric strings; anything else is treated as unknown.
fn lenient_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
