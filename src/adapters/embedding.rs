//! Default `EmbeddingModel` (spec §4.3): a deterministic hashed bag-of-words
//! vector. A real sentence-embedding model is explicitly out of scope (spec
//! §1); this gives hybrid/semantic search something consistent to run
//! against without one.

use async_trait::async_trait;
use resonance_core::error::Result;
use resonance_core::ports::EmbeddingModel;

const DIMENSIONS: usize = 256;

pub struct HashedEmbedder;

impl HashedEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn embed_one(text: &str) -> Vec<f32> {
    let mut vector = vec![0f32; DIMENSIONS];
    for token in text.split_whitespace() {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        use std::hash::{Hash, Hasher};
        token.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % DIMENSIONS;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingModel for HashedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_embeds_identically() {
        assert_eq!(embed_one("brown fox"), embed_one("brown fox"));
    }

    #[test]
    fn is_unit_normalized() {
        let v = embed_one("the quick brown fox jumps");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
