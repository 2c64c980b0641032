//! Query-time retrieval.
//!
//! Embeds a question with the same [`Embedder`] used at load time and runs a
//! k-nearest-neighbor query against a [`VectorIndex`]. Ranking is by cosine
//! distance, the same metric end-to-end.

use tracing::debug;

use crate::embedding::{l2_norm, Embedder};
use crate::error::{Error, Result};
use crate::models::RetrievalResult;
use crate::store::VectorIndex;

/// Default number of fragments retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Retrieve the `k` fragments closest to `question`.
///
/// # Errors
///
/// - [`Error::EmptyQuery`] for a blank question.
/// - [`Error::NoSearchableTerms`] when the question embeds to the zero
///   vector, e.g. `"???"` with the hash embedder.
/// - [`Error::Index`] with `NoCollection` when nothing has been loaded.
/// - [`Error::Embedding`] if the embedder fails.
pub async fn retrieve<E, I>(
    embedder: &E,
    index: &I,
    question: &str,
    k: usize,
) -> Result<RetrievalResult>
where
    E: Embedder + ?Sized,
    I: VectorIndex + ?Sized,
{
    if question.trim().is_empty() {
        return Err(Error::EmptyQuery);
    }

    let query_vec = embedder.embed_one(question).await?;
    if l2_norm(&query_vec) == 0.0 {
        return Err(Error::NoSearchableTerms);
    }
    let result = index.query(&query_vec, k).await?;
    debug!("Retrieved {} fragments for question", result.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::embedding::HashEmbedder;
    use crate::error::IndexError;
    use crate::store::memory::InMemoryIndex;

    async fn loaded_index(embedder: &HashEmbedder, text: &str) -> InMemoryIndex {
        let chunks = chunk_text(text, 60, 0).unwrap();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_many(&texts).await.unwrap();
        let index = InMemoryIndex::default();
        let positioned: Vec<(usize, &_)> = chunks.iter().enumerate().collect();
        index.load(&positioned, vectors).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_fragment_first() {
        let embedder = HashEmbedder::default();
        let text = format!(
            "{:<60}{:<60}{:<60}",
            "Cats sleep most of the afternoon.",
            "The warranty covers battery replacement.",
            "Rivers flow toward the sea."
        );
        let index = loaded_index(&embedder, &text).await;

        let result = retrieve(&embedder, &index, "battery warranty", 2).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.chunk_ids[0], "chunk_1");
        assert!(result.chunks[0].contains("warranty"));
    }

    #[tokio::test]
    async fn test_retrieve_blank_question() {
        let embedder = HashEmbedder::default();
        let index = InMemoryIndex::default();
        let err = retrieve(&embedder, &index, "   ", 4).await.unwrap_err();
        assert!(matches!(err, Error::EmptyQuery));
    }

    #[tokio::test]
    async fn test_retrieve_punctuation_only_question() {
        let embedder = HashEmbedder::default();
        let index = loaded_index(&embedder, "Opening hours are nine to five.").await;
        let err = retrieve(&embedder, &index, "???", 4).await.unwrap_err();
        assert!(matches!(err, Error::NoSearchableTerms));
        assert_eq!(err.to_string(), "question has no searchable terms");
    }

    #[tokio::test]
    async fn test_retrieve_without_collection() {
        let embedder = HashEmbedder::default();
        let index = InMemoryIndex::default();
        let err = retrieve(&embedder, &index, "anything", 4).await.unwrap_err();
        assert!(matches!(err, Error::Index(IndexError::NoCollection)));
    }
}
