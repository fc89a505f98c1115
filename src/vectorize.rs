//! Author vectorizer: one unit-length centroid per author.
//!
//! An author's text chunks are the joined interests string (when non-empty)
//! and one `"{title}. {abstract}"` chunk per publication. Chunks are embedded
//! individually, averaged, and renormalized.
//!
//! An author with no chunks gets an all-zero vector. It is deliberately not
//! normalized: its inner product with every query is `0.0`, so it can be
//! retrieved but never ranks above an author with real content.

use tracing::debug;

use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{AuthorId, AuthorRecord, AuthorsData};

pub struct AuthorVectorizer<'a> {
    provider: &'a dyn EmbeddingProvider,
    passage_prefix: &'a str,
}

impl<'a> AuthorVectorizer<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, passage_prefix: &'a str) -> Self {
        Self {
            provider,
            passage_prefix,
        }
    }

    /// Text chunks for one author, without the passage prefix.
    pub fn chunks(author: &AuthorRecord) -> Vec<String> {
        let mut chunks = Vec::with_capacity(author.publications.len() + 1);
        if !author.interests.is_empty() {
            chunks.push(author.interests.join(", "));
        }
        for publication in &author.publications {
            let abstract_text = publication.abstract_text.as_deref().unwrap_or("");
            if publication.title.trim().is_empty() && abstract_text.trim().is_empty() {
                continue;
            }
            chunks.push(format!("{}. {}", publication.title, abstract_text));
        }
        chunks
    }

    /// Vectorize a single author with one batched provider call.
    pub async fn vectorize(&self, author: &AuthorRecord) -> Result<Vec<f32>> {
        let chunks = self.prefixed(Self::chunks(author));
        if chunks.is_empty() {
            return Ok(vec![0.0; self.provider.dims()]);
        }
        let embeddings = self.embed(&chunks).await?;
        Ok(centroid(&embeddings, self.provider.dims()))
    }

    /// Vectorize a whole corpus. All chunks go to the provider in a single
    /// call; the provider splits them into request-sized batches.
    pub async fn vectorize_all(&self, authors: &AuthorsData) -> Result<Vec<(AuthorId, Vec<f32>)>> {
        let mut texts = Vec::new();
        let mut spans = Vec::with_capacity(authors.len());
        for (id, author) in authors {
            let start = texts.len();
            texts.extend(self.prefixed(Self::chunks(author)));
            spans.push((id.clone(), start..texts.len()));
        }

        debug!(
            authors = authors.len(),
            chunks = texts.len(),
            model = self.provider.model_name(),
            "embedding author chunks"
        );

        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embed(&texts).await?
        };

        let dims = self.provider.dims();
        Ok(spans
            .into_iter()
            .map(|(id, span)| (id, centroid(&embeddings[span], dims)))
            .collect())
    }

    fn prefixed(&self, chunks: Vec<String>) -> Vec<String> {
        if self.passage_prefix.is_empty() {
            return chunks;
        }
        chunks
            .into_iter()
            .map(|c| format!("{}{}", self.passage_prefix, c))
            .collect()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self
            .provider
            .embed(texts)
            .await
            .map_err(|e| Error::embedding(format!("{:#}", e)))?;
        if embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        let dims = self.provider.dims();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
            return Err(Error::embedding(format!(
                "expected {}-dim embeddings, got {}",
                dims,
                bad.len()
            )));
        }
        Ok(embeddings)
    }
}

/// Unit-normalized mean of `embeddings`; all-zero when there are none.
pub fn centroid(embeddings: &[Vec<f32>], dims: usize) -> Vec<f32> {
    let mut mean = vec![0.0f32; dims];
    if embeddings.is_empty() {
        return mean;
    }
    for e in embeddings {
        for (m, x) in mean.iter_mut().zip(e) {
            *m += x;
        }
    }
    let n = embeddings.len() as f32;
    for m in &mut mean {
        *m /= n;
    }
    l2_normalize(&mut mean);
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{dot, HashingProvider};
    use crate::models::PublicationRef;
    use anyhow::bail;
    use async_trait::async_trait;

    fn author(interests: &[&str], pubs: &[(&str, Option<&str>)]) -> AuthorRecord {
        AuthorRecord {
            id: AuthorId::Int(1),
            name: "A".into(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            bio: None,
            publications: pubs
                .iter()
                .map(|(t, a)| PublicationRef {
                    title: t.to_string(),
                    abstract_text: a.map(str::to_string),
                    year: None,
                    author_ids: vec![],
                })
                .collect(),
            coauthors: vec![],
        }
    }

    #[test]
    fn test_chunks_layout() {
        let a = author(&["NLP", "Transformers"], &[("Attention", None), ("BERT", Some("Deep."))]);
        assert_eq!(
            AuthorVectorizer::chunks(&a),
            vec!["NLP, Transformers", "Attention. ", "BERT. Deep."]
        );
    }

    #[test]
    fn test_blank_publication_skipped() {
        let a = author(&[], &[("  ", None)]);
        assert!(AuthorVectorizer::chunks(&a).is_empty());
    }

    #[test]
    fn test_centroid_is_unit_mean() {
        let c = centroid(&[vec![1.0, 0.0], vec![0.0, 1.0]], 2);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((c[0] - expected).abs() < 1e-6);
        assert!((c[1] - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_author_gets_zero_vector() {
        let p = HashingProvider::new(32).unwrap();
        let v = AuthorVectorizer::new(&p, "")
            .vectorize(&author(&[], &[]))
            .await
            .unwrap();
        assert_eq!(v.len(), 32);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_single_and_corpus_paths_agree() {
        let p = HashingProvider::new(64).unwrap();
        let vz = AuthorVectorizer::new(&p, "passage: ");
        let a = author(&["graph theory"], &[("Spectral methods", Some("Eigenvalues."))]);
        let single = vz.vectorize(&a).await.unwrap();
        let corpus: AuthorsData = [(a.id.clone(), a)].into_iter().collect();
        let all = vz.vectorize_all(&corpus).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!((dot(&single, &all[0].1) - 1.0).abs() < 1e-5);
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            bail!("quota exceeded")
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_embedding_error() {
        let err = AuthorVectorizer::new(&FailingProvider, "")
            .vectorize(&author(&["x"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(ref m) if m.contains("quota exceeded")));
    }
}
