//! Similarity providers for the shortlist stage.
//!
//! Default: `LexicalSimilarity` (token-bag cosine; pure, deterministic).
//! Production: `EmbeddingSimilarity` against an embedding service.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("embedding service error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {got} vectors for {expected} inputs")]
    ShapeMismatch { expected: usize, got: usize },
}

/// `similarity(a, b)` in [0, 1]. Carried as `Arc<dyn SimilarityProvider>`.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;

    /// Scores `query` against every candidate. Providers with a batch API
    /// should override this.
    async fn similarity_batch(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, SimilarityError> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(self.similarity(query, candidate).await?);
        }
        Ok(scores)
    }
}

/// Cosine similarity clamped to [0, 1]. Zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}

// ────────────────────────────────────────────────────────────────────────────
// LexicalSimilarity
// ────────────────────────────────────────────────────────────────────────────

const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "our", "you", "will", "are", "from", "into", "this", "that",
    "your", "who", "all", "team", "role", "work",
];

/// Lowercased alphanumeric tokens, stopwords and single characters dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn term_counts(text: &str) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

/// Term-frequency cosine over token bags. Ordered maps keep float sums
/// identical across runs.
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn score(a: &str, b: &str) -> f64 {
        let ca = term_counts(a);
        let cb = term_counts(b);
        if ca.is_empty() || cb.is_empty() {
            return 0.0;
        }
        let dot: f64 = ca
            .iter()
            .filter_map(|(t, n)| cb.get(t).map(|m| n * m))
            .sum();
        let na: f64 = ca.values().map(|n| n * n).sum::<f64>().sqrt();
        let nb: f64 = cb.values().map(|n| n * n).sum::<f64>().sqrt();
        (dot / (na * nb)).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl SimilarityProvider for LexicalSimilarity {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        Ok(Self::score(a, b))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EmbeddingSimilarity
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding service client: `POST {url} {"input": [..]}` → `{"embeddings": [[..]]}`.
pub struct EmbeddingSimilarity {
    client: Client,
    url: String,
}

impl EmbeddingSimilarity {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SimilarityError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }

    async fn embed(&self, inputs: Vec<&str>) -> Result<Vec<Vec<f32>>, SimilarityError> {
        let expected = inputs.len();
        let response: EmbedResponse = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { input: inputs })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.embeddings.len() != expected {
            return Err(SimilarityError::ShapeMismatch {
                expected,
                got: response.embeddings.len(),
            });
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl SimilarityProvider for EmbeddingSimilarity {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let vectors = self.embed(vec![a, b]).await?;
        Ok(cosine(&vectors[0], &vectors[1]))
    }

    async fn similarity_batch(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, SimilarityError> {
        let mut inputs = Vec::with_capacity(candidates.len() + 1);
        inputs.push(query);
        inputs.extend(candidates.iter().map(String::as_str));

        let vectors = self.embed(inputs).await?;
        let (query_vec, rest) = vectors.split_first().ok_or(SimilarityError::ShapeMismatch {
            expected: candidates.len() + 1,
            got: 0,
        })?;
        Ok(rest.iter().map(|v| cosine(query_vec, v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_negative_clamped_to_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_punctuation() {
        assert_eq!(
            tokenize("Build the ETL pipelines, and own data!"),
            vec!["build", "etl", "pipelines", "own", "data"]
        );
    }

    #[test]
    fn test_lexical_identical_text_scores_one() {
        let s = LexicalSimilarity::score("senior data engineer", "Senior Data Engineer");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lexical_disjoint_text_scores_zero() {
        assert_eq!(LexicalSimilarity::score("accountant ledger", "kubernetes rust"), 0.0);
        assert_eq!(LexicalSimilarity::score("", "anything"), 0.0);
    }

    #[test]
    fn test_lexical_partial_overlap_between_bounds() {
        let s = LexicalSimilarity::score("data engineer pipelines", "data analyst dashboards");
        assert!(s > 0.0 && s < 1.0, "got {s}");
    }

    #[tokio::test]
    async fn test_default_batch_matches_pairwise() {
        let provider = LexicalSimilarity;
        let candidates = vec!["data engineer".to_string(), "accountant".to_string()];
        let scores = provider
            .similarity_batch("data engineer", &candidates)
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 1.0).abs() < 1e-9);
        assert_eq!(scores[1], 0.0);
    }
}
