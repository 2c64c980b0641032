//! CLI command implementations.
//!
//! Each `run_*` function backs one `docqa` subcommand. Human-readable
//! results go to the given writer (stdout from `main`); diagnostics go
//! through `tracing` to stderr.

use anyhow::{Context, Result};
use docqa_core::answer::AnswerGenerator;
use docqa_core::chunk::ChunkConfig;
use docqa_core::embedding::Embedder;
use docqa_core::models::file_digest;
use docqa_core::session::{Answer, Session};
use docqa_core::store::memory::InMemoryIndex;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{extract_text, DocumentFormat, Extracted};

/// The session type the CLI runs: any configured embedder over the
/// in-memory index.
pub type DocSession = Session<Box<dyn Embedder>, InMemoryIndex>;

/// A file read from disk and turned into text.
pub struct LoadedFile {
    pub file_name: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
    pub extracted: Extracted,
}

/// Read and extract `path`. The format comes from the extension.
pub fn read_document(path: &Path) -> Result<LoadedFile> {
    let format = DocumentFormat::from_path(path)?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let extracted = extract_text(&bytes, format)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(
        "Extracted {} chars from {} ({} page(s))",
        extracted.text.chars().count(),
        file_name,
        extracted.pages
    );
    Ok(LoadedFile {
        file_name,
        format,
        bytes,
        extracted,
    })
}

/// Build an empty session from configuration.
pub fn new_session(config: &Config, top_k: usize) -> Result<DocSession> {
    let embedder = create_embedder(&config.embedding)?;
    let index = InMemoryIndex::new(config.index.collection_name.clone());
    let chunking = config.chunking.to_chunk_config()?;
    Ok(Session::new(embedder, index, chunking, top_k))
}

/// Load `path` into `session` unless it already holds the same content.
///
/// Returns `true` if the document was (re)processed.
pub async fn load_into(session: &mut DocSession, path: &Path) -> Result<bool> {
    let file = read_document(path)?;
    let hash = file_digest(&file.bytes);
    session.observe_upload(&hash).await;
    if !session.needs_processing(&hash) {
        info!("{} is already loaded", file.file_name);
        return Ok(false);
    }
    session
        .process(
            &file.file_name,
            &file.bytes,
            file.extracted.text,
            file.extracted.pages,
        )
        .await?;
    Ok(true)
}

// ============ chunk ============

/// Print the fragments of `path` as `id  start  size` lines.
pub fn run_chunk(
    config: &Config,
    path: &Path,
    size: Option<usize>,
    overlap: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let chunking = ChunkConfig::new(
        size.unwrap_or(config.chunking.size),
        overlap.unwrap_or(config.chunking.overlap),
    )?;
    let file = read_document(path)?;
    let chunks = chunking.chunk(&file.extracted.text);

    for c in &chunks {
        match c.page_number {
            Some(page) => writeln!(out, "{}  {}  {}  p{}", c.id, c.start_index, c.size, page)?,
            None => writeln!(out, "{}  {}  {}", c.id, c.start_index, c.size)?,
        }
    }
    writeln!(out, "fragments: {}", chunks.len())?;
    Ok(())
}

// ============ ask ============

pub async fn run_ask(
    config: &Config,
    generator: &dyn AnswerGenerator,
    path: &Path,
    question: &str,
    top_k: Option<usize>,
    show_context: bool,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = new_session(config, top_k.unwrap_or(config.retrieval.top_k))?;
    load_into(&mut session, path).await?;

    let answer = session.ask(question, generator).await?;
    writeln!(out, "{}", answer.text)?;
    if show_context {
        write_context(&answer, out)?;
    }
    Ok(())
}

fn write_context(answer: &Answer, out: &mut impl Write) -> Result<()> {
    let r = &answer.retrieval;
    writeln!(out)?;
    writeln!(out, "--- context ({} fragments) ---", r.len())?;
    for (i, ((id, content), distance)) in r
        .chunk_ids
        .iter()
        .zip(r.chunks.iter())
        .zip(r.distances.iter())
        .enumerate()
    {
        writeln!(out, "[{}] {} (distance {:.4})", i + 1, id, distance)?;
        writeln!(out, "{}", content)?;
    }
    Ok(())
}

// ============ info ============

pub async fn run_info(config: &Config, path: &Path, out: &mut impl Write) -> Result<()> {
    let file = read_document(path)?;
    let format = file.format;
    let mut session = new_session(config, config.retrieval.top_k)?;
    session
        .process(
            &file.file_name,
            &file.bytes,
            file.extracted.text,
            file.extracted.pages,
        )
        .await?;

    writeln!(out, "format: {}", format.as_str())?;
    write_session_info(&session, out).await
}

async fn write_session_info(session: &DocSession, out: &mut impl Write) -> Result<()> {
    match session.document() {
        Some(doc) => {
            writeln!(out, "file: {}", doc.file_name)?;
            writeln!(out, "sha256: {}", doc.file_hash)?;
            writeln!(out, "pages: {}", doc.total_pages)?;
            writeln!(out, "characters: {}", doc.full_text.chars().count())?;
            writeln!(out, "fragments: {}", doc.total_chunks())?;
        }
        None => writeln!(out, "file: (none)")?,
    }

    let index = session.index_info().await;
    writeln!(
        out,
        "index: {} ({})",
        index.name.as_deref().unwrap_or("-"),
        if index.loaded { "loaded" } else { "empty" }
    )?;
    writeln!(out, "indexed: {}", index.size)?;
    if let Some(dims) = index.dims {
        writeln!(out, "dims: {}", dims)?;
    }
    writeln!(out, "embedding: {}", session.embedder().model_name())?;
    writeln!(out, "history: {} messages", session.history().len())?;
    Ok(())
}

// ============ chat ============

/// Read questions line by line from `input` until EOF or `/quit`.
///
/// Slash commands: `/quit`, `/clear` (forget the conversation), `/info`,
/// `/load <file>` (switch documents; a file with new content resets the
/// index and history). A failed question is reported and the loop goes on.
pub async fn run_chat(
    session: &mut DocSession,
    generator: &dyn AnswerGenerator,
    input: impl BufRead,
    out: &mut impl Write,
    interactive: bool,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        if interactive {
            write!(out, "> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                writeln!(out, "History cleared.")?;
            }
            "/info" => write_session_info(session, out).await?,
            _ if line.starts_with("/load ") => {
                let path = Path::new(line.trim_start_matches("/load ").trim());
                match load_into(session, path).await {
                    Ok(true) => writeln!(out, "Loaded {}.", path.display())?,
                    Ok(false) => writeln!(out, "{} is already loaded.", path.display())?,
                    Err(e) => writeln!(out, "error: {:#}", e)?,
                }
            }
            question => match session.ask(question, generator).await {
                Ok(answer) => writeln!(out, "{}\n", answer.text)?,
                Err(e) => writeln!(out, "error: {}", e)?,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::ExtractiveGenerator;
    use std::io::Cursor;

    fn test_config(size: usize, overlap: usize) -> Config {
        let mut config = Config::default();
        config.chunking.size = size;
        config.chunking.overlap = overlap;
        config.retrieval.top_k = 1;
        config
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_run_chunk_reference_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(tmp.path(), "a.txt", &"x".repeat(1200));
        let mut out = Vec::new();
        run_chunk(&Config::default(), &path, None, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "chunk_0  0  500\nchunk_1  400  500\nchunk_2  800  400\nfragments: 3\n"
        );
    }

    #[test]
    fn test_run_chunk_rejects_bad_overrides() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(tmp.path(), "a.txt", "hello");
        let mut out = Vec::new();
        assert!(run_chunk(&Config::default(), &path, Some(10), Some(10), &mut out).is_err());
    }

    #[tokio::test]
    async fn test_chat_loop_commands() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = write_file(
            tmp.path(),
            "first.txt",
            "The library opens at nine in the morning.",
        );
        let second = write_file(
            tmp.path(),
            "second.txt",
            "Parking is free for visitors on weekends.",
        );

        let config = test_config(200, 20);
        let mut session = new_session(&config, 1).unwrap();
        assert!(load_into(&mut session, &first).await.unwrap());
        assert!(!load_into(&mut session, &first).await.unwrap());

        let script = format!(
            "When does the library open?\n\n/info\n/clear\n/info\n/load {}\nIs parking free?\n/quit\nnever asked\n",
            second.display()
        );
        let mut out = Vec::new();
        run_chat(
            &mut session,
            &ExtractiveGenerator,
            Cursor::new(script),
            &mut out,
            false,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("The library opens at nine in the morning."));
        assert!(text.contains("history: 2 messages"));
        assert!(text.contains("History cleared."));
        assert!(text.contains("history: 0 messages"));
        assert!(text.contains("Loaded"));
        assert!(text.contains("Parking is free for visitors on weekends."));
        assert!(!text.contains("never asked"));
        assert_eq!(session.document().unwrap().file_name, "second.txt");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_reports_errors_and_continues() {
        let config = test_config(200, 20);
        let mut session = new_session(&config, 1).unwrap();
        let mut out = Vec::new();
        run_chat(
            &mut session,
            &ExtractiveGenerator,
            Cursor::new("anything?\n/load missing.pdf\n"),
            &mut out,
            false,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("error: no document has been processed yet"));
        assert!(text.contains("error: Failed to read missing.pdf"));
    }
}
