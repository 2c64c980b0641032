//! # docqa
//!
//! Ask questions about a PDF, Word, Excel or plain-text document.
//!
//! The document is split into overlapping fixed-size fragments, each
//! fragment is embedded, and the vectors are loaded into an in-memory
//! index. A question is embedded with the same model, the nearest
//! fragments by cosine distance become the context, and a language model
//! (or the offline extractive fallback) answers from that context and the
//! conversation so far.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌─────────────┐   ┌──────────────┐
//! │ extract  │──▶│  chunk  │──▶│  embedding  │──▶│ InMemoryIndex│
//! │ pdf/docx │   │ (core)  │   │ hash/openai │   │    (core)    │
//! │ xlsx/txt │   └─────────┘   │ ollama/local│   └──────┬───────┘
//! └──────────┘                 └─────────────┘          │ top-k
//!                                                       ▼
//!                         ┌──────────┐   prompt   ┌──────────┐
//!                         │ Session  │──────────▶│ generate │
//!                         │ history  │◀──────────│ gemini/… │
//!                         └──────────┘   answer   └──────────┘
//! ```
//!
//! The pipeline itself (chunking, the embedding contract, the vector index,
//! retrieval and the session) lives in the `docqa-core` crate; this crate
//! adds file extraction, model-backed providers, configuration and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction by file format |
//! | [`embedding`] | Embedding providers |
//! | [`generate`] | Prompt construction and answer generators |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
mod http;
