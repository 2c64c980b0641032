//! Core data models for the retrieval pipeline.
//!
//! These types represent the documents, fragments, retrieval results, and
//! conversation messages that flow between the chunker, the index, and the
//! session.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded, offset-addressable slice of a document's text.
///
/// Offsets and sizes count chars, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `chunk_<sequence>`, unique within a document.
    pub id: String,
    pub content: String,
    /// Char offset of the first character in the document text.
    pub start_index: usize,
    /// Actual content length in chars (the final window may be short).
    pub size: usize,
    pub page_number: Option<u32>,
}

/// An ingested document and its fragments.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub file_name: String,
    /// SHA-256 hex digest of the raw file bytes.
    pub file_hash: String,
    pub full_text: String,
    /// Ordered by ascending `start_index`.
    pub chunks: Vec<Chunk>,
    pub total_pages: u32,
}

impl Document {
    /// Look up a fragment by its id.
    pub fn chunk_by_id(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == chunk_id)
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }
}

/// Metadata stored with each index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    /// Position of the fragment in the document's chunk sequence.
    pub chunk_index: usize,
    pub start_index: usize,
    pub chunk_size: usize,
}

/// Fragments retrieved for a query, ranked by ascending distance.
///
/// The three vectors are parallel: position `i` of each describes the same
/// fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunks: Vec<String>,
    pub chunk_ids: Vec<String>,
    pub distances: Vec<f32>,
}

impl RetrievalResult {
    /// Join all fragments into a single context block, separated by a blank
    /// line, in ranked order.
    pub fn context_text(&self) -> String {
        self.chunks.join("\n\n")
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Content digest used to detect whether an uploaded file changed.
///
/// Lowercase hex SHA-256 of the raw bytes. Used for change detection only.
pub fn file_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_text_joins_with_blank_line() {
        let result = RetrievalResult {
            chunks: vec!["first".into(), "second".into()],
            chunk_ids: vec!["chunk_1".into(), "chunk_0".into()],
            distances: vec![0.1, 0.4],
        };
        assert_eq!(result.context_text(), "first\n\nsecond");
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_file_digest_known_value() {
        assert_eq!(
            file_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(file_digest(b"abc"), file_digest(b"abd"));
    }

    #[test]
    fn test_chunk_by_id() {
        let doc = Document {
            file_name: "a.txt".into(),
            file_hash: file_digest(b"hello"),
            full_text: "hello".into(),
            chunks: vec![Chunk {
                id: "chunk_0".into(),
                content: "hello".into(),
                start_index: 0,
                size: 5,
                page_number: None,
            }],
            total_pages: 1,
        };
        assert_eq!(doc.total_chunks(), 1);
        assert!(doc.chunk_by_id("chunk_0").is_some());
        assert!(doc.chunk_by_id("chunk_1").is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ConversationMessage {
            role: Role::Assistant,
            content: "hi".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
