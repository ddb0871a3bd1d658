/*!
 * Similarity backends.
 *
 * A `SimilarityBackend` embeds text and compares two embeddings. Scores are
 * bounded, symmetric, and higher means more similar.
 */

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{SimilarityConfig, SimilarityType};
use crate::errors::SimilarityError;
use crate::providers::ollama::{EmbeddingRequest, Ollama};

/// Dense vector produced by a similarity backend
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    /// Identifier recorded in report metadata
    fn id(&self) -> String;

    async fn embed(&self, text: &str) -> Result<Embedding, SimilarityError>;

    /// Score two embeddings within `bounds()`
    fn similarity(&self, a: &Embedding, b: &Embedding) -> Result<f64, SimilarityError>;

    /// Inclusive (min, max) of `similarity`
    fn bounds(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }
}

/// Cosine similarity in [-1, 1]. Two zero vectors are identical and score 1;
/// a zero vector against a non-zero one scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= f64::EPSILON && norm_b <= f64::EPSILON {
        return Ok(1.0);
    }

    // Identical count vectors score exactly 1.0
    let denom = (norm_a * norm_b).sqrt();
    if denom <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Offline embedder: character trigrams hashed into a fixed-size count vector
#[derive(Debug, Clone)]
pub struct HashedNgramEmbedder {
    dimensions: usize,
}

impl HashedNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, gram: &str) -> usize {
        let digest = Sha256::digest(gram.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dimensions as u64) as usize
    }

    /// Embed synchronously; used by `embed` and by benchmarks
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            // '<' and '>' mark word boundaries
            let chars: Vec<char> = std::iter::once('<')
                .chain(word.chars())
                .chain(std::iter::once('>'))
                .collect();
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                vector[self.bucket(&gram)] += 1.0;
            }
        }
        Embedding(vector)
    }
}

#[async_trait]
impl SimilarityBackend for HashedNgramEmbedder {
    fn id(&self) -> String {
        format!("hashed-ngram-{}", self.dimensions)
    }

    async fn embed(&self, text: &str) -> Result<Embedding, SimilarityError> {
        Ok(self.embed_text(text))
    }

    fn similarity(&self, a: &Embedding, b: &Embedding) -> Result<f64, SimilarityError> {
        cosine_similarity(a.as_slice(), b.as_slice())
    }
}

/// Sentence embeddings from an Ollama embedding model
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, SimilarityError> {
        Ok(Self {
            client: Ollama::new(endpoint, timeout)?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl SimilarityBackend for OllamaEmbedder {
    fn id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn embed(&self, text: &str) -> Result<Embedding, SimilarityError> {
        let response = self.client.embeddings(EmbeddingRequest::new(&self.model, text)).await?;
        Ok(Embedding(response.embedding))
    }

    fn similarity(&self, a: &Embedding, b: &Embedding) -> Result<f64, SimilarityError> {
        cosine_similarity(a.as_slice(), b.as_slice())
    }
}

/// Build the similarity backend the scoring configuration selects
pub fn create_similarity(config: &SimilarityConfig) -> anyhow::Result<Arc<dyn SimilarityBackend>> {
    let backend: Arc<dyn SimilarityBackend> = match config.similarity_type {
        SimilarityType::HashedNgram => Arc::new(HashedNgramEmbedder::new(config.dimensions)),
        SimilarityType::Ollama => {
            url::Url::parse(&config.endpoint)?;
            Arc::new(OllamaEmbedder::new(
                config.endpoint.clone(),
                config.model.clone(),
                Duration::from_secs(config.timeout_secs.max(1)),
            )?)
        }
    };
    Ok(backend)
}
