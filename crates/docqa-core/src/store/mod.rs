//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the operations the retrieval pipeline
//! needs from a similarity-searchable store. An index holds at most one
//! collection at a time and is always in one of two states, modelled by
//! [`IndexState`]:
//!
//! ```text
//!            load()                 load()
//!   Empty ───────────▶ Loaded ◀──────────┐
//!     ▲                  │  └────────────┘
//!     └──── reset() ─────┘
//! ```
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::IndexError;
use crate::models::{Chunk, EntryMetadata, RetrievalResult};

/// A stored fragment vector with its metadata.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub fragment_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// The single active collection of a loaded index.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub dims: usize,
    /// In load order, which is also the tie-break order for equal distances.
    pub entries: Vec<IndexEntry>,
}

/// Index state machine.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Empty,
    Loaded(Collection),
}

impl IndexState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, IndexState::Loaded(_))
    }
}

/// Introspection snapshot returned by [`VectorIndex::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub loaded: bool,
    /// Number of entries in the active collection (0 when empty).
    pub size: usize,
    pub name: Option<String>,
    pub dims: Option<usize>,
}

/// Similarity-searchable store of fragment vectors.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](VectorIndex::load) | Replace the collection with a new one |
/// | [`query`](VectorIndex::query) | k-nearest-neighbor retrieval |
/// | [`info`](VectorIndex::info) | State and size, no side effects |
/// | [`reset`](VectorIndex::reset) | Drop the collection; no-op when empty |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace any existing collection with `chunks` and their `vectors`.
    ///
    /// Each chunk is paired with its position in the document's chunk
    /// sequence, which is stored as [`EntryMetadata::chunk_index`]. Skipped
    /// fragments leave gaps in those positions.
    ///
    /// Readers never observe a partially replaced collection. On error the
    /// previous state is left untouched.
    async fn load(
        &self,
        chunks: &[(usize, &Chunk)],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError>;

    /// Metadata of the entry with `fragment_id`, if one is loaded.
    async fn metadata(&self, fragment_id: &str) -> Option<EntryMetadata>;

    /// Return up to `k` fragments ranked by ascending cosine distance.
    ///
    /// Fails with [`IndexError::NoCollection`] when nothing is loaded.
    async fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult, IndexError>;

    async fn info(&self) -> IndexInfo;

    /// Return to the `Empty` state.
    async fn reset(&self);
}
