use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use docuchain_core::{Document, Embedding};

use crate::{FragmentSearch, RetrievalError, SearchType};

const DEFAULT_FETCH_K: usize = 20;
const DEFAULT_LAMBDA_MULT: f32 = 0.5;

#[derive(Default)]
struct StoreInner {
    docs: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    id_map: HashMap<String, usize>,
    dimension: Option<usize>,
}

/// Fragment store kept in memory, embedding text with `E`.
#[derive(Clone)]
pub struct InMemoryFragmentStore<E> {
    embedder: Arc<E>,
    inner: Arc<RwLock<StoreInner>>,
    fetch_k: usize,
    lambda_mult: f32,
}

impl<E: Embedding> InMemoryFragmentStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder: Arc::new(embedder),
            inner: Arc::default(),
            fetch_k: DEFAULT_FETCH_K,
            lambda_mult: DEFAULT_LAMBDA_MULT,
        }
    }

    /// Number of candidates MMR reranks.
    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    /// Weight of query relevance against diversity in MMR, in `[0, 1]`.
    pub fn with_lambda_mult(mut self, lambda_mult: f32) -> Self {
        self.lambda_mult = lambda_mult.clamp(0.0, 1.0);
        self
    }

    /// Adds fragments, embedding those that carry no embedding yet. A
    /// fragment with an existing id replaces the stored one.
    pub async fn add(&self, docs: Vec<Document>) -> Result<(), RetrievalError> {
        if let Some(doc) = docs.iter().find(|doc| doc.id.trim().is_empty()) {
            return Err(RetrievalError::InvalidId(doc.id.clone()));
        }

        let missing: Vec<String> = docs
            .iter()
            .filter(|doc| doc.embedding.is_none())
            .map(|doc| doc.content.clone())
            .collect();
        let mut computed = self.embedder.embed_batch(&missing).await?.into_iter();

        let mut inner = self.inner.write().await;
        for mut doc in docs {
            let embedding = match doc.embedding.take() {
                Some(embedding) => embedding,
                None => computed.next().ok_or_else(|| {
                    RetrievalError::Other("embedder returned too few vectors".to_string())
                })?,
            };
            let dimension = embedding.len();
            match inner.dimension {
                Some(expected) if expected != dimension => {
                    return Err(RetrievalError::DimensionMismatch {
                        expected,
                        got: dimension,
                    });
                }
                None => inner.dimension = Some(dimension),
                _ => {}
            }

            if let Some(&index) = inner.id_map.get(&doc.id) {
                inner.docs[index] = doc;
                inner.embeddings[index] = embedding;
            } else {
                let index = inner.docs.len();
                inner.id_map.insert(doc.id.clone(), index);
                inner.docs.push(doc);
                inner.embeddings.push(embedding);
            }
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<E: Embedding> FragmentSearch for InMemoryFragmentStore<E> {
    async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        k: usize,
    ) -> Result<Vec<Document>, RetrievalError> {
        let query_embedding = self.embedder.embed(query).await?;
        let inner = self.inner.read().await;
        let expected = inner.dimension.unwrap_or(query_embedding.len());
        if expected != query_embedding.len() {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                got: query_embedding.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = inner
            .embeddings
            .iter()
            .enumerate()
            .map(|(idx, embedding)| {
                let score = cosine_similarity(&query_embedding, embedding);
                (idx, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let selected = match search_type {
            SearchType::Similarity => scored.into_iter().take(k).map(|(idx, _)| idx).collect(),
            SearchType::Mmr => {
                scored.truncate(self.fetch_k.max(k));
                maximal_marginal_relevance(&scored, &inner.embeddings, k, self.lambda_mult)
            }
        };

        Ok(selected
            .into_iter()
            .map(|idx| {
                let mut doc = inner.docs[idx].clone();
                doc.embedding = None;
                doc
            })
            .collect())
    }
}

/// Greedily picks `k` candidates, trading similarity to the query against
/// similarity to what was already picked. `candidates` holds
/// `(index, query similarity)` pairs.
fn maximal_marginal_relevance(
    candidates: &[(usize, f32)],
    embeddings: &[Vec<f32>],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, (idx, relevance)) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|chosen| cosine_similarity(&embeddings[*idx], &embeddings[*chosen]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda_mult * relevance - (1.0 - lambda_mult) * redundancy;
            if score > best_score {
                best = pos;
                best_score = score;
            }
        }
        let (idx, _) = remaining.remove(best);
        selected.push(idx);
    }
    selected
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
