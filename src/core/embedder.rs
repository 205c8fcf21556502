use crate::core::{Embedder, EmbeddingProvider, EmbeddingSettings};
use crate::utils::error::{RagError, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Output size of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(
            settings.endpoint.clone(),
            settings.model.clone(),
            settings.dimension,
        )?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(settings.dimension))),
    }
}

/// Embeds `texts` in batches of `batch_size`, keeping input order.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
        tracing::debug!("Embedding batch {} ({} texts)", batch_no + 1, batch.len());
        let embedded = embedder.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(RagError::ProcessingError {
                message: format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Client for an embedding service exposing `POST /api/embed`.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            dimension,
        })
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.endpoint);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        tracing::debug!("POST {} ({} inputs)", url, texts.len());
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::ProcessingError {
                message: format!("embedding request failed: {} {}", status, body),
            });
        }

        let body: Value = response.json().await?;
        let vectors = parse_embeddings(&body)?;

        if vectors.len() != texts.len() {
            return Err(RagError::ProcessingError {
                message: format!(
                    "embedding service returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                ),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        Ok(vectors)
    }
}

fn parse_embeddings(body: &Value) -> Result<Vec<Vec<f32>>> {
    let value = body
        .get("embeddings")
        .or_else(|| body.get("embedding"))
        .ok_or_else(|| RagError::ProcessingError {
            message: "no embeddings in response".to_string(),
        })?;

    let rows = value.as_array().ok_or_else(|| RagError::ProcessingError {
        message: "embeddings is not an array".to_string(),
    })?;

    // 單一向量的回應包成一列
    if rows.first().map(|v| v.is_number()).unwrap_or(false) {
        return Ok(vec![parse_vector(value)?]);
    }
    rows.iter().map(parse_vector).collect()
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
    let items = value.as_array().ok_or_else(|| RagError::ProcessingError {
        message: "embedding is not an array".to_string(),
    })?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|n| n as f32)
                .ok_or_else(|| RagError::ProcessingError {
                    message: "embedding value is not a number".to_string(),
                })
        })
        .collect()
}

/// Deterministic offline embedder: character trigrams hashed into buckets
/// with a signed count, then L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized: Vec<char> = format!(" {} ", text.to_lowercase())
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();

        for window in normalized.windows(3) {
            let hash = fnv1a(window);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("The quick brown fox");
        let b = embedder.embed_one("the quick  brown fox");

        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(a, embedder.embed_one("The quick brown fox"));
        // 大小寫不影響
        assert_eq!(a, embedder.embed_one("THE QUICK BROWN FOX"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hashing_embedder_similar_text_is_closer() {
        let embedder = HashingEmbedder::new(DEFAULT_EMBEDDING_DIMENSION);
        let query = embedder.embed_one("capital of france");
        let near = embedder.embed_one("Paris is the capital of France.");
        let far = embedder.embed_one("Photosynthesis converts light into energy.");

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        assert!(dist(&query, &near) < dist(&query, &far));
    }

    #[test]
    fn test_parse_embeddings_shapes() {
        let matrix = serde_json::json!({"embeddings": [[0.1, 0.2], [0.3, 0.4]]});
        assert_eq!(parse_embeddings(&matrix).unwrap().len(), 2);

        let single = serde_json::json!({"embedding": [0.5, 0.6]});
        assert_eq!(parse_embeddings(&single).unwrap(), vec![vec![0.5, 0.6]]);

        let missing = serde_json::json!({"data": []});
        assert!(parse_embeddings(&missing).is_err());
    }

    #[tokio::test]
    async fn test_embed_in_batches_preserves_order() {
        let embedder = HashingEmbedder::new(16);
        let texts: Vec<String> = (0..70).map(|i| format!("chunk number {}", i)).collect();

        let vectors = embed_in_batches(&embedder, &texts, 32).await.unwrap();

        assert_eq!(vectors.len(), 70);
        assert_eq!(vectors[69], embedder.embed_one("chunk number 69"));
    }

    #[tokio::test]
    async fn test_http_embedder_posts_inputs() {
        let server = MockServer::start_async().await;
        let embed_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(serde_json::json!({
                        "model": "all-minilm",
                        "input": ["alpha", "beta"]
                    }));
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(serde_json::json!({"embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]}));
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "all-minilm".to_string(), 3).unwrap();
        let vectors = embedder
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        embed_mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_http_embedder_rejects_wrong_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(serde_json::json!({"embeddings": [[1.0, 0.0]]}));
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "all-minilm".to_string(), 384).unwrap();
        let err = embedder.embed(&["alpha".to_string()]).await.unwrap_err();

        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 384,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_http_embedder_surfaces_server_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("model not loaded");
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "all-minilm".to_string(), 3).unwrap();
        let err = embedder.embed(&["alpha".to_string()]).await.unwrap_err();

        assert!(err.to_string().contains("model not loaded"));
    }
}
