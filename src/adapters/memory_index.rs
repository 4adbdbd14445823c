//! Default `VectorStore` and `KeywordIndex` (spec §4.3, §4.6): in-process,
//! brute-force implementations. A real vector database and lexical index
//! are explicitly out of scope (spec §1, "single-host only" non-goal); this
//! adapter is sized for that non-goal rather than for production recall.

use async_trait::async_trait;
use resonance_core::error::Result;
use resonance_core::model::Chunk;
use resonance_core::ports::{KeywordIndex, LexicalHit, VectorHit, VectorStore};
use std::collections::HashMap;
use std::sync::RwLock;

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.insert(chunk.id.clone(), Entry { chunk: chunk.clone(), vector: vector.clone() });
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: u32) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read().unwrap();
        let mut hits: Vec<VectorHit> = entries
            .values()
            .map(|e| VectorHit { chunk_id: e.chunk.id.clone(), score: cosine(query_vector, &e.vector) })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k as usize);
        Ok(hits)
    }

    async fn delete_by_submission(&self, submission_id: i64) -> Result<()> {
        self.entries.write().unwrap().retain(|_, e| e.chunk.submission_id != submission_id);
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.entries.read().unwrap().is_empty())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }

    async fn contains_ids(&self, ids: &[String]) -> Result<std::collections::HashSet<String>> {
        let entries = self.entries.read().unwrap();
        Ok(ids.iter().filter(|id| entries.contains_key(*id)).cloned().collect())
    }
}

/// Naive term-overlap lexical index, scored by shared-token count — a stand
/// in for a real BM25/inverted index.
#[derive(Default)]
pub struct InMemoryKeywordIndex {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl InMemoryKeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokens(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

#[async_trait]
impl KeywordIndex for InMemoryKeywordIndex {
    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let mut store = self.chunks.write().unwrap();
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn search(&self, query_text: &str, top_k: u32) -> Result<Vec<LexicalHit>> {
        let query_tokens = tokens(query_text);
        let store = self.chunks.read().unwrap();
        let mut hits: Vec<LexicalHit> = store
            .values()
            .map(|c| {
                let overlap = tokens(&c.text).intersection(&query_tokens).count();
                LexicalHit { chunk_id: c.id.clone(), score: overlap as f32 }
            })
            .filter(|h| h.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k as usize);
        Ok(hits)
    }

    async fn delete_by_submission(&self, submission_id: i64) -> Result<()> {
        self.chunks.write().unwrap().retain(|_, c| c.submission_id != submission_id);
        Ok(())
    }

    async fn get_text(&self, chunk_id: &str) -> Result<Option<String>> {
        Ok(self.chunks.read().unwrap().get(chunk_id).map(|c| c.text.clone()))
    }
}
