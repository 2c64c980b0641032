//! # docqa CLI
//!
//! Ask questions about a single document from the command line.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa chunk <file>` | Print the fragments the file is split into |
//! | `docqa ask <file> "<question>"` | Answer one question about the file |
//! | `docqa chat <file>` | Interactive question loop with conversation history |
//! | `docqa info <file>` | Show document and index information |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect chunking with a smaller window
//! docqa chunk contract.pdf --size 300 --overlap 50
//!
//! # One-shot question, showing the retrieved fragments
//! docqa ask contract.pdf "What is the notice period?" --show-context
//!
//! # Conversation over a spreadsheet
//! docqa chat budget.xlsx
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::commands;
use docqa::config::{self, Config};
use docqa::generate::create_generator;

const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

/// docqa: question answering over a PDF, Word, Excel or text document.
///
/// Settings are read from a TOML file; see `config/docqa.example.toml`.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about a PDF, Word, Excel or text document",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`; built-in defaults are used when
    /// that file does not exist. An explicitly given path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug detail to stderr (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file into fragments and print them.
    ///
    /// Prints one `id  start  size` line per fragment (plus the page when
    /// the text has page breaks) and a final `fragments: N` line.
    Chunk {
        /// Document to split (.pdf, .docx, .xlsx, .txt).
        file: PathBuf,

        /// Fragment size in characters (overrides `chunking.size`).
        #[arg(long)]
        size: Option<usize>,

        /// Overlap in characters (overrides `chunking.overlap`).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Answer a single question about a file.
    Ask {
        /// Document to ask about.
        file: PathBuf,

        /// The question.
        question: String,

        /// Number of fragments to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Also print the retrieved fragments and their distances.
        #[arg(long)]
        show_context: bool,
    },

    /// Ask questions read line by line from stdin.
    ///
    /// Commands: `/quit`, `/clear`, `/info`, `/load <file>`.
    Chat {
        /// Document to ask about.
        file: PathBuf,
    },

    /// Process a file and print document and index information.
    Info {
        /// Document to inspect.
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_cli_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => config::load_or_default(std::path::Path::new(DEFAULT_CONFIG_PATH)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = load_cli_config(cli.config.as_ref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Chunk {
            file,
            size,
            overlap,
        } => {
            commands::run_chunk(&cfg, &file, size, overlap, &mut out)?;
        }
        Commands::Ask {
            file,
            question,
            top_k,
            show_context,
        } => {
            let generator = create_generator(&cfg.generation)?;
            commands::run_ask(
                &cfg,
                generator.as_ref(),
                &file,
                &question,
                top_k,
                show_context,
                &mut out,
            )
            .await?;
        }
        Commands::Chat { file } => {
            let generator = create_generator(&cfg.generation)?;
            let mut session = commands::new_session(&cfg, cfg.retrieval.top_k)?;
            commands::load_into(&mut session, &file).await?;

            let interactive = atty::is(atty::Stream::Stdin);
            if interactive {
                if let Some(doc) = session.document() {
                    eprintln!(
                        "Loaded {} ({} fragments). Ask a question, or /quit to exit.",
                        doc.file_name,
                        doc.total_chunks()
                    );
                }
            }
            let stdin = std::io::stdin();
            commands::run_chat(
                &mut session,
                generator.as_ref(),
                stdin.lock(),
                &mut out,
                interactive,
            )
            .await?;
        }
        Commands::Info { file } => {
            commands::run_info(&cfg, &file, &mut out).await?;
        }
    }

    Ok(())
}
