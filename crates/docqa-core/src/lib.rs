//! # docqa core
//!
//! Chunking and retrieval pipeline for document question answering:
//! fixed-window fragment chunking, the embedding contract, an in-memory
//! vector index, query-time retrieval, and the session object that ties
//! them to a conversation.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies.
//! Extraction, model-backed embedding providers and answer generation live
//! in the `docqa` application crate.
//!
//! ```text
//! text ─▶ chunk ─▶ Embedder::embed_many ─▶ VectorIndex::load
//! question ─▶ Embedder::embed_one ─▶ VectorIndex::query ─▶ RetrievalResult ─▶ AnswerGenerator
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod history;
pub mod models;
pub mod search;
pub mod session;
pub mod store;

pub use error::{ChunkError, EmbedError, Error, GenerateError, IndexError, Result};
