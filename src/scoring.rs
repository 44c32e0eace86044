//! Similarity scoring between two texts.

use crate::embedding::{cosine_similarity, Embedder, EmbeddingError};

/// Scores text pairs by the cosine similarity of their embeddings.
pub struct Scorer<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> Scorer<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// Similarity in `[-1, 1]`; symmetric in its arguments. Blank text has
    /// no direction and scores 0 against anything.
    pub fn score(&self, a: &str, b: &str) -> Result<f32, EmbeddingError> {
        if a.trim().is_empty() || b.trim().is_empty() {
            return Ok(0.0);
        }
        let va = self.embedder.embed(a)?;
        let vb = self.embedder.embed(b)?;
        Ok(cosine_similarity(&va, &vb))
    }
}
