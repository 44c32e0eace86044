//! Sentence embeddings and vector helpers.
//!
//! [`FastEmbedEmbedder`] runs all-MiniLM-L6-v2 locally through fastembed.
//! [`HashEmbedder`] is a deterministic, offline bag-of-words stand-in used
//! when the model is unavailable and in tests.

use crate::config::{Config, ConfigError};
use thiserror::Error;

/// Output size of all-MiniLM-L6-v2
pub const DEFAULT_DIMENSIONS: usize = 384;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyText,
    #[error("embedding model failed: {0}")]
    ModelFailed(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Model identifier
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Build the embedder named by `[embedding] provider`
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>, EmbeddingError> {
    match config.embedding.provider.as_str() {
        #[cfg(feature = "fastembed-embeddings")]
        "fastembed" => Ok(Box::new(FastEmbedEmbedder::new())),
        "hash" => Ok(Box::new(HashEmbedder::default())),
        other => Err(ConfigError::Unsupported {
            kind: "embedding provider",
            value: other.to_string(),
        }
        .into()),
    }
}

#[cfg(feature = "fastembed-embeddings")]
pub use native::FastEmbedEmbedder;

#[cfg(feature = "fastembed-embeddings")]
mod native {
    use super::{Embedder, EmbeddingError, DEFAULT_DIMENSIONS};
    use std::sync::{Mutex, OnceLock};
    use std::time::Instant;

    /// all-MiniLM-L6-v2 via fastembed, loaded on first use.
    pub struct FastEmbedEmbedder {
        model: OnceLock<Mutex<fastembed::TextEmbedding>>,
    }

    impl FastEmbedEmbedder {
        pub fn new() -> Self {
            Self {
                model: OnceLock::new(),
            }
        }

        fn model(&self) -> Result<&Mutex<fastembed::TextEmbedding>, EmbeddingError> {
            if let Some(model) = self.model.get() {
                return Ok(model);
            }

            tracing::info!("loading embedding model (first use)");
            let start = Instant::now();
            let options =
                fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                    .with_show_download_progress(false);
            let model = fastembed::TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelFailed(e.to_string()))?;
            tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "embedding model loaded"
            );

            Ok(self.model.get_or_init(|| Mutex::new(model)))
        }
    }

    impl Default for FastEmbedEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn model_name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }

        fn dimensions(&self) -> usize {
            DEFAULT_DIMENSIONS
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.trim().is_empty() {
                return Err(EmbeddingError::EmptyText);
            }

            let mut model = self
                .model()?
                .lock()
                .map_err(|_| EmbeddingError::ModelFailed("embedding model lock poisoned".to_string()))?;
            model
                .embed(vec![text.to_string()], None)
                .map_err(|e| EmbeddingError::ModelFailed(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::ModelFailed("no embedding returned".to_string()))
        }
    }
}

/// Deterministic pseudo-embeddings: hashed, lowercased word counts,
/// L2-normalised. Same text, same vector, on every platform.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = (fnv1a(word.as_bytes()) % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

/// 64-bit FNV-1a, stable across runs unlike `DefaultHasher`
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
