//! Exact inner-product vector index over author centroids.
//!
//! Every author occupies one dense slot. `slots[i]` and `slot_of[id]` form a
//! bijection over the snapshot's author set; the vectors live in one
//! row-major matrix. The index is built once and never mutated.
//!
//! Search is brute force. Stored vectors are unit length (or zero), so the
//! inner product is the cosine similarity. Equal scores keep ascending slot
//! order.

use std::collections::HashMap;

use crate::embedding::{embed_query, l2_normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{AuthorId, Candidate};

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dims: usize,
    slots: Vec<AuthorId>,
    slot_of: HashMap<AuthorId, usize>,
    matrix: Vec<f32>,
}

impl VectorIndex {
    /// Build from `(id, vector)` pairs. Slot order follows input order.
    pub fn build(vectors: Vec<(AuthorId, Vec<f32>)>) -> Result<Self> {
        let dims = vectors.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut slots = Vec::with_capacity(vectors.len());
        let mut slot_of = HashMap::with_capacity(vectors.len());
        let mut matrix = Vec::with_capacity(vectors.len() * dims);

        for (id, vector) in vectors {
            if vector.len() != dims {
                return Err(Error::malformed(format!(
                    "vector for author {} has {} dims, expected {}",
                    id,
                    vector.len(),
                    dims
                )));
            }
            if slot_of.insert(id.clone(), slots.len()).is_some() {
                return Err(Error::malformed(format!("author {} indexed twice", id)));
            }
            slots.push(id);
            matrix.extend_from_slice(&vector);
        }

        Ok(Self {
            dims,
            slots,
            slot_of,
            matrix,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn contains(&self, id: &AuthorId) -> bool {
        self.slot_of.contains_key(id)
    }

    /// Stored vector for `id`.
    pub fn vector(&self, id: &AuthorId) -> Option<&[f32]> {
        self.slot_of.get(id).map(|&slot| self.row(slot))
    }

    fn row(&self, slot: usize) -> &[f32] {
        &self.matrix[slot * self.dims..(slot + 1) * self.dims]
    }

    /// Top-`k` authors by inner product with `query`. Nobody is excluded.
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>> {
        self.run_search(query, k, None)
    }

    /// Top-`k` authors most similar to a known author, excluding that author.
    pub fn search_similar_to_author(&self, id: &AuthorId, k: usize) -> Result<Vec<Candidate>> {
        let slot = *self
            .slot_of
            .get(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        let query = self.row(slot).to_vec();
        self.run_search(&query, k, Some(slot))
    }

    /// Embed `text` and search with it as a normalized query vector.
    pub async fn search_by_text(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<Candidate>> {
        let mut query = embed_query(provider, text)
            .await
            .map_err(|e| Error::embedding(format!("{:#}", e)))?;
        l2_normalize(&mut query);
        self.search_by_vector(&query, k)
    }

    fn run_search(&self, query: &[f32], k: usize, exclude: Option<usize>) -> Result<Vec<Candidate>> {
        if !self.is_empty() && query.len() != self.dims {
            return Err(Error::malformed(format!(
                "query has {} dims, index has {}",
                query.len(),
                self.dims
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..self.slots.len())
            .filter(|slot| Some(*slot) != exclude)
            .map(|slot| (slot, dot_unchecked(self.row(slot), query)))
            .collect();

        // Stable sort: equal scores stay in slot order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| Candidate {
                id: self.slots[slot].clone(),
                semantic_score: score as f64,
            })
            .collect())
    }
}

fn dot_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
