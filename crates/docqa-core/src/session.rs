//! Explicit session context for one interactive user.
//!
//! A [`Session`] owns everything that changes when a new file is uploaded:
//! the current [`Document`], the [`VectorIndex`] collection built from it,
//! and the [`ConversationHistory`]. Document changes are detected by
//! comparing content digests, never by flags.
//!
//! # Lifecycle
//!
//! ```text
//! observe_upload(hash) ──▶ needs_processing? ──▶ process(...) ──▶ ask(...) ──▶ ask(...) …
//!        │
//!        └─ hash differs from current document: drop document, reset index, clear history
//! ```

use tracing::{debug, info};

use crate::answer::AnswerGenerator;
use crate::chunk::ChunkConfig;
use crate::embedding::{l2_norm, Embedder};
use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use crate::models::{file_digest, Chunk, Document, RetrievalResult};
use crate::search::retrieve;
use crate::store::{IndexInfo, VectorIndex};

/// An answer together with the fragments it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub retrieval: RetrievalResult,
}

pub struct Session<E, I> {
    embedder: E,
    index: I,
    chunking: ChunkConfig,
    top_k: usize,
    document: Option<Document>,
    history: ConversationHistory,
}

impl<E: Embedder, I: VectorIndex> Session<E, I> {
    pub fn new(embedder: E, index: I, chunking: ChunkConfig, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            chunking,
            top_k: top_k.max(1),
            document: None,
            history: ConversationHistory::new(),
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn index_info(&self) -> IndexInfo {
        self.index.info().await
    }

    /// True when no document is loaded or the loaded one has another digest.
    pub fn needs_processing(&self, file_hash: &str) -> bool {
        self.document
            .as_ref()
            .map_or(true, |doc| doc.file_hash != file_hash)
    }

    /// Register that a file with `file_hash` was uploaded.
    ///
    /// If it differs from the current document, the document is dropped, the
    /// index reset and the history cleared. Returns whether anything was
    /// discarded.
    pub async fn observe_upload(&mut self, file_hash: &str) -> bool {
        if !self.needs_processing(file_hash) {
            return false;
        }
        if let Some(previous) = self.document.take() {
            info!(
                "Document changed ({} → {}); discarding session state",
                previous.file_name, file_hash
            );
            self.index.reset().await;
            self.history.clear();
            return true;
        }
        false
    }

    /// Chunk, embed and index a document, replacing the previous one.
    ///
    /// `text` is the extracted text of `bytes`. Whitespace-only fragments
    /// are kept in the [`Document`] but not embedded. Fragments the embedder
    /// maps to the zero vector (punctuation-only tails, `-----` dividers)
    /// are kept too but not indexed, since nothing can be ranked against them.
    ///
    /// # Errors
    ///
    /// Embedding or index load failures. On failure the previous document
    /// and collection stay in place.
    pub async fn process(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        text: String,
        total_pages: u32,
    ) -> Result<&Document> {
        let file_hash = file_digest(bytes);
        let chunks = self.chunking.chunk(&text);

        let candidates: Vec<(usize, &Chunk)> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.content.trim().is_empty())
            .collect();
        let texts: Vec<String> = candidates.iter().map(|(_, c)| c.content.clone()).collect();

        debug!(
            "Embedding {} of {} fragments with {}",
            texts.len(),
            chunks.len(),
            self.embedder.model_name()
        );
        let vectors = self.embedder.embed_many(&texts).await?;

        let mut indexed = Vec::with_capacity(candidates.len());
        let mut kept_vectors = Vec::with_capacity(vectors.len());
        if vectors.len() == candidates.len() {
            for (candidate, vector) in candidates.into_iter().zip(vectors) {
                if l2_norm(&vector) == 0.0 {
                    debug!("Skipping {}: embeds to the zero vector", candidate.1.id);
                    continue;
                }
                indexed.push(candidate);
                kept_vectors.push(vector);
            }
        } else {
            // Let the index report the count mismatch.
            indexed = candidates;
            kept_vectors = vectors;
        }
        self.index.load(&indexed, kept_vectors).await?;

        info!(
            "Processed {}: {} fragments, {} indexed",
            file_name,
            chunks.len(),
            indexed.len()
        );

        self.history.clear();
        Ok(self.document.insert(Document {
            file_name: file_name.to_string(),
            file_hash,
            full_text: text,
            chunks,
            total_pages: total_pages.max(1),
        }))
    }

    /// Answer a question about the current document.
    ///
    /// Retrieves the top fragments, asks `generator` with the current
    /// history, then records the question and answer in the history.
    ///
    /// # Errors
    ///
    /// [`Error::NoDocument`] if nothing has been processed; otherwise any
    /// retrieval or generation error. History is only updated on success.
    pub async fn ask<G>(&mut self, question: &str, generator: &G) -> Result<Answer>
    where
        G: AnswerGenerator + ?Sized,
    {
        if self.document.is_none() {
            return Err(Error::NoDocument);
        }

        let retrieval = retrieve(&self.embedder, &self.index, question, self.top_k).await?;
        let context = retrieval.context_text();
        let text = generator
            .generate(&context, question, self.history.messages())
            .await?;

        self.history.add_user_message(question);
        self.history.add_assistant_message(text.clone());

        Ok(Answer { text, retrieval })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::embedding::HashEmbedder;
    use crate::error::GenerateError;
    use crate::models::{ConversationMessage, Role};
    use crate::store::memory::InMemoryIndex;

    /// Echoes its inputs so tests can see what the session passed in.
    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            context: &str,
            question: &str,
            history: &[ConversationMessage],
        ) -> std::result::Result<String, GenerateError> {
            Ok(format!(
                "q={} history={} context_len={}",
                question,
                history.len(),
                context.len()
            ))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            _context: &str,
            _question: &str,
            _history: &[ConversationMessage],
        ) -> std::result::Result<String, GenerateError> {
            Err(GenerateError::Request("service unavailable".into()))
        }
    }

    fn session() -> Session<HashEmbedder, InMemoryIndex> {
        Session::new(
            HashEmbedder::default(),
            InMemoryIndex::default(),
            ChunkConfig::new(40, 10).unwrap(),
            3,
        )
    }

    const TEXT: &str = "Invoices are payable within thirty days. Late payments incur a fee. \
                        Support is available on weekdays from nine to five.";

    #[tokio::test]
    async fn test_ask_before_processing_fails() {
        let mut s = session();
        let err = s.ask("anything", &EchoGenerator).await.unwrap_err();
        assert!(matches!(err, Error::NoDocument));
        assert!(s.history().is_empty());
    }

    #[tokio::test]
    async fn test_process_then_ask_updates_history() {
        let mut s = session();
        let doc = s
            .process("terms.txt", TEXT.as_bytes(), TEXT.to_string(), 1)
            .await
            .unwrap();
        assert_eq!(doc.file_name, "terms.txt");
        assert_eq!(doc.file_hash, file_digest(TEXT.as_bytes()));
        assert!(doc.total_chunks() > 1);

        let answer = s.ask("When are invoices payable?", &EchoGenerator).await.unwrap();
        assert!(answer.text.starts_with("q=When are invoices payable? history=0"));
        assert_eq!(answer.retrieval.len(), 3);
        assert_eq!(answer.retrieval.chunk_ids[0], "chunk_0");

        let second = s.ask("And late payments?", &EchoGenerator).await.unwrap();
        assert!(second.text.contains("history=2"));

        let roles: Vec<Role> = s.history().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_history_untouched() {
        let mut s = session();
        s.process("terms.txt", TEXT.as_bytes(), TEXT.to_string(), 1)
            .await
            .unwrap();
        let err = s.ask("fees?", &FailingGenerator).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(s.history().is_empty());
    }

    #[tokio::test]
    async fn test_change_detection_by_digest() {
        let mut s = session();
        s.process("terms.txt", TEXT.as_bytes(), TEXT.to_string(), 1)
            .await
            .unwrap();
        s.ask("fees?", &EchoGenerator).await.unwrap();

        let same = file_digest(TEXT.as_bytes());
        assert!(!s.needs_processing(&same));
        assert!(!s.observe_upload(&same).await);
        assert_eq!(s.history().len(), 2);

        let other = file_digest(b"a different file");
        assert!(s.needs_processing(&other));
        assert!(s.observe_upload(&other).await);
        assert!(s.document().is_none());
        assert!(s.history().is_empty());
        assert!(!s.index_info().await.loaded);

        let err = s.ask("fees?", &EchoGenerator).await.unwrap_err();
        assert!(matches!(err, Error::NoDocument));
    }

    #[tokio::test]
    async fn test_blank_fragments_are_not_indexed() {
        let mut s = Session::new(
            HashEmbedder::default(),
            InMemoryIndex::default(),
            ChunkConfig::new(10, 0).unwrap(),
            4,
        );
        let text = format!("{}{}{}", "alpha beta", " ".repeat(10), "gamma delt");
        let doc = s
            .process("gaps.txt", text.as_bytes(), text.clone(), 1)
            .await
            .unwrap();
        assert_eq!(doc.total_chunks(), 3);
        let info = s.index_info().await;
        assert_eq!(info.size, 2);
    }

    #[tokio::test]
    async fn test_skipped_fragments_keep_positions_in_metadata() {
        let index = InMemoryIndex::default();
        let mut s = Session::new(HashEmbedder::default(), index, ChunkConfig::new(10, 0).unwrap(), 4);
        let text = format!("{}{}{}", "alpha beta", " ".repeat(10), "gamma delt");
        s.process("gaps.txt", text.as_bytes(), text.clone(), 1)
            .await
            .unwrap();

        let meta = s.index.metadata("chunk_2").await.unwrap();
        assert_eq!(meta.chunk_index, 2);
        assert_eq!(meta.start_index, 20);
        assert_eq!(meta.chunk_size, 10);
        assert!(s.index.metadata("chunk_1").await.is_none());
    }

    #[tokio::test]
    async fn test_punctuation_only_tail_is_not_indexed() {
        let mut s = Session::new(
            HashEmbedder::default(),
            InMemoryIndex::default(),
            ChunkConfig::new(500, 100).unwrap(),
            4,
        );
        let text = format!("{}).", "word ".repeat(160));
        let doc = s
            .process("notes.txt", text.as_bytes(), text.clone(), 1)
            .await
            .unwrap();
        assert_eq!(doc.total_chunks(), 3);
        assert_eq!(doc.chunks[2].content, ").");

        assert_eq!(s.index_info().await.size, 2);
        let answer = s.ask("word", &EchoGenerator).await.unwrap();
        assert_eq!(answer.retrieval.chunk_ids.len(), 2);
        assert!(!answer.retrieval.chunk_ids.contains(&"chunk_2".to_string()));
    }

    #[tokio::test]
    async fn test_divider_fragment_between_text_is_skipped() {
        let mut s = Session::new(
            HashEmbedder::default(),
            InMemoryIndex::default(),
            ChunkConfig::new(10, 0).unwrap(),
            4,
        );
        let text = format!("{}{}{}", "alpha beta", "-".repeat(10), "gamma delt");
        s.process("divider.txt", text.as_bytes(), text.clone(), 1)
            .await
            .unwrap();
        assert_eq!(s.index_info().await.size, 2);
        assert_eq!(s.index.metadata("chunk_2").await.unwrap().chunk_index, 2);
    }

    #[tokio::test]
    async fn test_empty_document_loads_empty_collection() {
        let mut s = session();
        let doc = s.process("empty.txt", b"", String::new(), 1).await.unwrap();
        assert_eq!(doc.total_chunks(), 0);
        assert!(s.index_info().await.loaded);

        let answer = s.ask("anything?", &EchoGenerator).await.unwrap();
        assert!(answer.retrieval.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let mut s = session();
        s.process("terms.txt", TEXT.as_bytes(), TEXT.to_string(), 1)
            .await
            .unwrap();
        assert!(matches!(
            s.ask("  ", &EchoGenerator).await,
            Err(Error::EmptyQuery)
        ));
        assert!(s.history().is_empty());
    }
}
