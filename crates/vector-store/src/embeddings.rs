use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_STUB_DIMENSION: usize = 256;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";

/// Turns text into a fixed-dimension vector.
///
/// Implementations must return vectors of the same dimension for every
/// call. `model_id` is recorded with persisted indexes so a cache built by
/// one model is never reused with another.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_id(&self) -> String;
}

/// Call `provider.embed` bounded by `timeout`.
///
/// Empty input and empty or non-finite output are rejected so a broken
/// provider can't poison the index.
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
        return Err(VectorStoreError::EmbeddingError(
            "cannot embed empty text".to_string(),
        ));
    }

    let embedding = tokio::time::timeout(timeout, provider.embed(text))
        .await
        .map_err(|_| VectorStoreError::EmbeddingTimeout(timeout))??;

    if embedding.is_empty() {
        return Err(VectorStoreError::EmbeddingError(format!(
            "{} returned an empty embedding",
            provider.model_id()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(VectorStoreError::EmbeddingError(format!(
            "{} returned a non-finite embedding",
            provider.model_id()
        )));
    }
    Ok(embedding)
}

/// Deterministic offline embedder.
///
/// Hashes lowercase word tokens into `dimension` buckets and L2-normalizes
/// the counts, so texts sharing words land close together. Useful for tests
/// and for running without a model server.
#[derive(Debug, Clone, Copy)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        stub_embed(text, self.dimension)
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_STUB_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_id(&self) -> String {
        format!("stub-hash-{}", self.dimension)
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server (`POST /api/embeddings`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_EMBED_MODEL)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text.trim(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Ollama request to {url} failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::EmbeddingError(format!(
                "Ollama API error {status}: {body}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            VectorStoreError::EmbeddingError(format!("invalid Ollama embedding response: {e}"))
        })?;
        Ok(result.embedding)
    }

    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let lowered = text.to_lowercase();
    let mut vec = vec![0.0_f32; dimension];
    let mut any_token = false;
    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a_64(token.as_bytes()) % dimension as u64) as usize;
        vec[bucket] += 1.0;
        any_token = true;
    }

    if !any_token {
        return noise_embed(text, dimension);
    }
    normalize(&mut vec);
    vec
}

/// Pseudo-random unit vector seeded by the raw text, for inputs without words.
fn noise_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::cosine_similarity;

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0])
        }

        fn model_id(&self) -> String {
            "slow".to_string()
        }
    }

    struct BrokenEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn model_id(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn stub_is_deterministic_and_normalized() {
        let embedder = StubEmbedder::new(64);
        let a = embedder.embed_sync("How do I reset my password?");
        let b = embedder.embed_sync("How do I reset my password?");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stub_places_overlapping_texts_closer() {
        let embedder = StubEmbedder::default();
        let query = embedder.embed_sync("reset password");
        let related = embedder.embed_sync("How do I reset my password");
        let unrelated = embedder.embed_sync("Shipping takes five business days");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn stub_handles_text_without_words() {
        let embedder = StubEmbedder::new(16);
        let v = embedder.embed_sync("?!?");
        assert_eq!(v.len(), 16);
        assert!(v.iter().any(|x| *x != 0.0));
    }

    #[tokio::test]
    async fn stub_model_id_includes_dimension() {
        let embedder = StubEmbedder::new(32);
        assert_eq!(embedder.model_id(), "stub-hash-32");
        let v = embed_with_timeout(&embedder, "hello", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(v.len(), 32);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let timeout = Duration::from_millis(50);
        let err = embed_with_timeout(&SlowEmbedder, "anything", timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::EmbeddingTimeout(d) if d == timeout));
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn rejects_empty_input_and_bad_output() {
        let timeout = Duration::from_secs(1);
        assert!(embed_with_timeout(&StubEmbedder::default(), "   ", timeout)
            .await
            .is_err());
        assert!(embed_with_timeout(&BrokenEmbedder(vec![]), "text", timeout)
            .await
            .is_err());
        assert!(
            embed_with_timeout(&BrokenEmbedder(vec![f32::NAN, 1.0]), "text", timeout)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn unreachable_ollama_is_a_provider_failure() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9/", "nomic-embed-text");
        assert_eq!(embedder.base_url(), "http://127.0.0.1:9");
        assert_eq!(embedder.model_id(), "ollama:nomic-embed-text");
        let err = embed_with_timeout(&embedder, "hello", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }
}
