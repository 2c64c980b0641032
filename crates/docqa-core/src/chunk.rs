//! Fixed-window text chunker with overlap.
//!
//! Splits a document's full text into an ordered sequence of [`Chunk`]s of
//! `size` characters, each starting `size - overlap` characters after the
//! previous one. The last fragment may be shorter than `size`; it is never
//! padded.
//!
//! # Algorithm
//!
//! 1. Validate `size > 0` and `overlap < size` (otherwise the step would be
//!    non-positive and the loop would never terminate).
//! 2. Starting at offset 0, take the next `size` characters as a fragment.
//! 3. Advance the start offset by `size - overlap`.
//! 4. Stop once the start offset reaches the text length.
//!
//! Offsets and sizes are counted in `char`s, so a window never splits a
//! UTF-8 code point. Fragment ids are `chunk_0`, `chunk_1`, … in creation
//! order.
//!
//! When the text contains form feeds (`\x0c`, emitted by the PDF extractor
//! between pages), each fragment records the 1-based page its first
//! character falls on.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::chunk_text;
//!
//! let text = "a".repeat(1200);
//! let chunks = chunk_text(&text, 500, 100).unwrap();
//! let starts: Vec<usize> = chunks.iter().map(|c| c.start_index).collect();
//! assert_eq!(starts, vec![0, 400, 800]);
//! assert_eq!(chunks[2].size, 400);
//! assert_eq!(chunks[2].id, "chunk_2");
//! ```

use serde::Serialize;

use crate::error::ChunkError;
use crate::models::Chunk;

/// Page separator inserted by the PDF extractor.
pub const PAGE_BREAK: char = '\u{c}';

/// Validated chunking parameters.
///
/// Construction is the only place the `overlap < size` invariant is
/// checked; a `ChunkConfig` value is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkConfig {
    size: usize,
    overlap: usize,
}

impl ChunkConfig {
    /// Create a chunking configuration.
    ///
    /// # Errors
    ///
    /// [`ChunkError::InvalidConfig`] if `size == 0` or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({}) must be less than size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive fragment starts. Always `>= 1`.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }

    /// Split `text` into overlapping fragments.
    ///
    /// Empty text yields an empty sequence. The function is pure: identical
    /// input always yields identical output.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char, plus the end of the text, so that a
        // char range [a, b) maps to bytes [offsets[a], offsets[b]).
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = offsets.len() - 1;
        let step = self.step();

        let paginated = text.contains(PAGE_BREAK);
        let mut page: u32 = 1;
        let mut scanned_byte = 0usize;

        let mut chunks = Vec::with_capacity(total_chars.div_ceil(step));
        let mut start = 0usize;
        let mut sequence = 0usize;

        while start < total_chars {
            let end = (start + self.size).min(total_chars);
            let (byte_start, byte_end) = (offsets[start], offsets[end]);
            let content = &text[byte_start..byte_end];

            let page_number = if paginated {
                page += text[scanned_byte..byte_start].matches(PAGE_BREAK).count() as u32;
                scanned_byte = byte_start;
                Some(page)
            } else {
                None
            };

            chunks.push(Chunk {
                id: format!("chunk_{}", sequence),
                content: content.to_string(),
                start_index: start,
                size: end - start,
                page_number,
            });

            sequence += 1;
            start += step;
        }

        chunks
    }
}

/// Split `text` into fragments of `size` chars overlapping by `overlap`.
///
/// Convenience wrapper that validates the parameters and chunks in one call.
///
/// # Errors
///
/// [`ChunkError::InvalidConfig`] if `size == 0` or `overlap >= size`; no
/// fragment is produced in that case.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    Ok(ChunkConfig::new(size, overlap)?.chunk(text))
}
