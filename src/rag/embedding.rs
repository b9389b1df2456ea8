//! Embedding functions used by the passage store.
//!
//! `HashingEmbedder` is the offline default: a signed feature-hashing model over
//! stemmed unigrams and bigrams. It is deterministic across processes and
//! platforms, so vectors persisted by one run stay valid in the next.
//! `OpenAiEmbedder` calls an OpenAI-compatible `/v1/embeddings` endpoint.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::core::config::defaults::{DEFAULT_EMBEDDING_MODEL, DEFAULT_HASHING_MODEL};
use crate::core::config::{EmbeddingProviderKind, EmbeddingSettings, LlmSettings};
use crate::core::errors::ResearchError;
use crate::vector_math::normalize;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded next to persisted vectors; a change forces a reindex.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError>;
}

/// Embeds `inputs` and checks the vector count and dimension.
pub async fn embed_checked(
    embedder: &dyn Embedder,
    inputs: &[String],
) -> Result<Vec<Vec<f32>>, ResearchError> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = embedder.embed(inputs).await?;
    if vectors.len() != inputs.len() {
        return Err(ResearchError::Store(format!(
            "embedder '{}' returned {} vectors for {} inputs",
            embedder.model_id(),
            vectors.len(),
            inputs.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dimension()) {
        return Err(ResearchError::Store(format!(
            "embedder '{}' returned a {}-dimensional vector, expected {}",
            embedder.model_id(),
            bad.len(),
            embedder.dimension()
        )));
    }
    Ok(vectors)
}

/// Builds the embedder selected by configuration.
pub fn build_embedder(embedding: &EmbeddingSettings, llm: &LlmSettings) -> Arc<dyn Embedder> {
    match embedding.provider {
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(embedding.dimension)),
        EmbeddingProviderKind::Openai => Arc::new(OpenAiEmbedder::new(
            embedding.base_url.clone().unwrap_or_else(|| llm.base_url.clone()),
            llm.api_key.clone(),
            embedding
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding.dimension,
        )),
    }
}

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token pattern is valid"));

const STOP_WORDS: [&str; 32] = [
    "a", "an", "the", "and", "or", "of", "in", "on", "to", "is", "are", "be", "by", "for",
    "with", "as", "at", "that", "this", "it", "its", "from", "was", "were", "has", "have",
    "what", "which", "who", "how", "does", "do",
];

const SUFFIXES: [(&str, &str); 11] = [
    ("ations", ""),
    ("ation", ""),
    ("ments", ""),
    ("ment", ""),
    ("ings", ""),
    ("ing", ""),
    ("ies", "y"),
    ("ers", ""),
    ("er", ""),
    ("ed", ""),
    ("s", ""),
];

const MIN_STEM_CHARS: usize = 3;
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("{}/{}", DEFAULT_HASHING_MODEL, dimension),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut terms = terms(text);
        if terms.is_empty() {
            terms = fallback_terms(text);
        }
        let mut vector = vec![0.0_f32; self.dimension];

        for term in &terms {
            self.accumulate(&mut vector, term, 1.0);
        }
        for pair in terms.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, &bigram, BIGRAM_WEIGHT);
        }

        normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(stem)
        .collect()
}

/// Features for text with no content terms: raw tokens, stop words included,
/// or character trigrams when there are no word characters at all.
fn fallback_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<String> = TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect();
    if !tokens.is_empty() {
        return tokens;
    }

    let chars: Vec<char> = lowered.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() <= 3 {
        return vec![chars.into_iter().collect()];
    }
    chars.windows(3).map(|gram| gram.iter().collect()).collect()
}

fn stem(token: &str) -> String {
    if token.ends_with("ss") {
        return token.to_string();
    }
    for (suffix, replacement) in SUFFIXES {
        if let Some(base) = token.strip_suffix(suffix) {
            if base.chars().count() >= MIN_STEM_CHARS {
                return format!("{}{}", base, replacement);
            }
        }
    }
    token.to_string()
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: String, api_key: Option<String>, model: String, dimension: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(ResearchError::store)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ResearchError::Store(format!(
                "embedding endpoint returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ResearchError::store)?;
        let data = payload["data"].as_array().ok_or_else(|| {
            ResearchError::Store("embedding response has no 'data' array".to_string())
        })?;

        let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let values = item["embedding"].as_array().ok_or_else(|| {
                ResearchError::Store("embedding response item has no vector".to_string())
            })?;
            let vector = values
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| {
                    ResearchError::Store("embedding vector contains non-numbers".to_string())
                })?;
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            indexed.push((index, vector));
        }
        indexed.sort_by_key(|(index, _)| *index);

        Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_math::cosine_similarity;

    #[test]
    fn stemming_folds_common_inflections() {
        assert_eq!(stem("employment"), "employ");
        assert_eq!(stem("employer"), "employ");
        assert_eq!(stem("contracts"), "contract");
        assert_eq!(stem("parties"), "party");
        assert_eq!(stem("business"), "business");
        assert_eq!(stem("law"), "law");
    }

    #[test]
    fn stop_words_and_punctuation_are_dropped() {
        assert_eq!(
            terms("The Burden of Proof, in civil cases!"),
            vec!["burden", "proof", "civil", "case"]
        );
    }

    #[test]
    fn text_without_content_terms_still_gets_a_direction() {
        let embedder = HashingEmbedder::new(128);
        for text in ["... --- !!!", "of the and", "?!"] {
            let vector = embedder.embed_text(text);
            let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "{:?} embedded to a zero vector", text);
        }
    }

    #[test]
    fn same_text_gives_same_vector() {
        let embedder = HashingEmbedder::new(128);
        let first = embedder.embed_text("Tenancy Law of Lagos State 2011");
        let second = embedder.embed_text("Tenancy Law of Lagos State 2011");

        assert_eq!(first, second);
        assert_eq!(first.len(), 128);
        assert!((cosine_similarity(&first, &second) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_higher_than_unrelated() {
        let embedder = HashingEmbedder::new(512);
        let query = embedder.embed_text("employment contract obligations");
        let labor = embedder.embed_text(
            "In Nigerian labor law, an employer must provide a written contract of employment within 3 months of engagement.",
        );
        let tenancy = embedder.embed_text(
            "The Tenancy Law of Lagos State 2011 regulates the relationship between landlords and tenants.",
        );

        assert!(cosine_similarity(&query, &labor) > cosine_similarity(&query, &tenancy));
    }

    #[test]
    fn text_without_terms_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let vector = embedder.embed_text("the of and ...");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn model_id_tracks_dimension() {
        assert_ne!(
            HashingEmbedder::new(256).model_id(),
            HashingEmbedder::new(512).model_id()
        );
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
            Ok(inputs.iter().skip(1).map(|_| vec![0.0; 4]).collect())
        }
    }

    #[tokio::test]
    async fn embed_checked_rejects_missing_vectors() {
        let inputs = vec!["a".to_string(), "b".to_string()];
        let err = embed_checked(&ShortEmbedder, &inputs).await.unwrap_err();
        assert!(matches!(err, ResearchError::Store(ref m) if m.contains("1 vectors for 2 inputs")));
    }
}
