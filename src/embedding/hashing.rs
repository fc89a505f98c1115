//! Offline feature-hashing embedder.
//!
//! Each lowercase alphanumeric token (with a trailing plural `s` dropped) is
//! hashed with SHA-256; the first four digest bytes pick a bucket and the
//! fifth picks a sign. Texts that share words land close together, which is
//! enough for demos, tests, and air-gapped deployments. No model download.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider};

pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            bail!("hashing provider needs dims > 0");
        }
        Ok(Self { dims })
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dims;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let lower = t.to_lowercase();
            match lower.strip_suffix('s') {
                Some(stem) if stem.chars().count() >= 3 && !stem.ends_with('s') => stem.to_string(),
                _ => lower,
            }
        })
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
