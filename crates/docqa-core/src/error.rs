//! Error types for the chunking and retrieval pipeline.
//!
//! Each component has its own error enum; [`Error`] wraps them all so the
//! session layer can propagate any of them with `?`.
//!
//! | Kind | Variants |
//! |------|----------|
//! | configuration | [`ChunkError::InvalidConfig`] |
//! | input | [`Error::EmptyQuery`], [`Error::NoSearchableTerms`] |
//! | state | [`IndexError::NoCollection`], [`Error::NoDocument`] |
//! | domain | [`EmbedError::ZeroNorm`], [`IndexError::ZeroNorm`], [`IndexError::ZeroNormQuery`] |
//! | contract | [`IndexError::LengthMismatch`], [`IndexError::DimensionMismatch`], [`IndexError::InvalidK`] |

use thiserror::Error;

/// Top-level error for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("answer generation error: {0}")]
    Generation(#[from] GenerateError),

    /// A question was asked before any document was processed.
    #[error("no document has been processed yet; process a document first")]
    NoDocument,

    /// The question was empty or whitespace-only.
    #[error("question is empty")]
    EmptyQuery,

    /// The question embedded to the zero vector (e.g. only punctuation).
    #[error("question has no searchable terms")]
    NoSearchableTerms,
}

/// Chunking errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedError {
    /// Cosine similarity is undefined for an empty or all-zero vector.
    #[error("cannot compute similarity with a zero-norm vector")]
    ZeroNorm,

    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The backend could not produce embeddings.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
}

/// Vector index errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// Query issued while the index is in the `Empty` state.
    #[error("no collection loaded")]
    NoCollection,

    #[error("fragment/vector count mismatch: {fragments} fragments, {vectors} vectors")]
    LengthMismatch { fragments: usize, vectors: usize },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("k must be greater than zero")]
    InvalidK,

    #[error("zero-norm vector for entry '{0}'")]
    ZeroNorm(String),

    /// The query vector is all zeros, so no entry can be ranked against it.
    #[error("query vector has zero norm")]
    ZeroNormQuery,

    #[error("similarity failed: {0}")]
    Similarity(String),
}

/// Answer generation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("generator not configured: {0}")]
    NotConfigured(String),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
