//! In-memory [`VectorIndex`] implementation.
//!
//! Keeps the [`IndexState`] behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector, which is exact and
//! fast enough for a single document's fragments.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::{cosine_distance, l2_norm};
use crate::error::{EmbedError, IndexError};
use crate::models::{Chunk, EntryMetadata, RetrievalResult};

use super::{Collection, IndexEntry, IndexInfo, IndexState, VectorIndex};

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "documents";

/// In-memory vector index holding one collection at a time.
pub struct InMemoryIndex {
    name: String,
    state: RwLock<IndexState>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(IndexState::Empty),
        }
    }

    /// Validate inputs and build a collection without touching `self.state`.
    fn build_collection(
        &self,
        chunks: &[(usize, &Chunk)],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Collection, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                fragments: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        let mut entries = Vec::with_capacity(chunks.len());

        for (&(position, chunk), embedding) in chunks.iter().zip(vectors) {
            if embedding.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    expected: dims,
                    actual: embedding.len(),
                });
            }
            if l2_norm(&embedding) == 0.0 {
                return Err(IndexError::ZeroNorm(chunk.id.clone()));
            }
            entries.push(IndexEntry {
                fragment_id: chunk.id.clone(),
                content: chunk.content.clone(),
                embedding,
                metadata: EntryMetadata {
                    chunk_index: position,
                    start_index: chunk.start_index,
                    chunk_size: chunk.size,
                },
            });
        }

        Ok(Collection {
            name: self.name.clone(),
            dims,
            entries,
        })
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION)
    }
}

fn to_index_error(err: EmbedError, dims: usize) -> IndexError {
    match err {
        EmbedError::DimensionMismatch { right, .. } => IndexError::DimensionMismatch {
            expected: dims,
            actual: right,
        },
        EmbedError::ZeroNorm => IndexError::ZeroNormQuery,
        other => IndexError::Similarity(other.to_string()),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn load(
        &self,
        chunks: &[(usize, &Chunk)],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        let collection = self.build_collection(chunks, vectors)?;
        debug!(
            "Loaded collection '{}' ({} entries, {} dims)",
            collection.name,
            collection.entries.len(),
            collection.dims
        );

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = IndexState::Loaded(collection);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let collection = match &*state {
            IndexState::Empty => return Err(IndexError::NoCollection),
            IndexState::Loaded(c) => c,
        };

        if collection.entries.is_empty() {
            return Ok(RetrievalResult::default());
        }
        if vector.len() != collection.dims {
            return Err(IndexError::DimensionMismatch {
                expected: collection.dims,
                actual: vector.len(),
            });
        }
        if l2_norm(vector) == 0.0 {
            return Err(IndexError::ZeroNormQuery);
        }

        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(collection.entries.len());
        for (i, entry) in collection.entries.iter().enumerate() {
            let distance = cosine_distance(&entry.embedding, vector)
                .map_err(|e| to_index_error(e, collection.dims))?;
            scored.push((i, distance));
        }

        // Stable sort: equal distances keep load order.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let mut result = RetrievalResult {
            chunks: Vec::with_capacity(scored.len()),
            chunk_ids: Vec::with_capacity(scored.len()),
            distances: Vec::with_capacity(scored.len()),
        };
        for (i, distance) in scored {
            let entry = &collection.entries[i];
            result.chunks.push(entry.content.clone());
            result.chunk_ids.push(entry.fragment_id.clone());
            result.distances.push(distance);
        }

        debug!("Query returned {} of {} entries", result.len(), collection.entries.len());
        Ok(result)
    }

    async fn metadata(&self, fragment_id: &str) -> Option<EntryMetadata> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            IndexState::Empty => None,
            IndexState::Loaded(c) => c
                .entries
                .iter()
                .find(|e| e.fragment_id == fragment_id)
                .map(|e| e.metadata),
        }
    }

    async fn info(&self) -> IndexInfo {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            IndexState::Empty => IndexInfo {
                loaded: false,
                size: 0,
                name: None,
                dims: None,
            },
            IndexState::Loaded(c) => IndexInfo {
                loaded: true,
                size: c.entries.len(),
                name: Some(c.name.clone()),
                dims: Some(c.dims),
            },
        }
    }

    async fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.is_loaded() {
            debug!("Dropping collection '{}'", self.name);
        }
        *state = IndexState::Empty;
    }
}
