//! End-to-end tests driving the `docqa` binary with the offline `hash`
//! embedder and `extractive` answer generator.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

const WARRANTY_DOC: &str = "Cats sleep most of the afternoon.\n\
The warranty covers battery replacement for two years.\n\
Rivers flow toward the sea and carry sediment.\n";

fn setup_test_env(chunking: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"{}

[retrieval]
top_k = 1

[embedding]
provider = "hash"

[generation]
provider = "extractive"
"#,
        chunking
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_doc(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_docqa_with_stdin(config_path, args, None)
}

fn run_docqa_with_stdin(
    config_path: &Path,
    args: &[&str],
    stdin: Option<&str>,
) -> (String, String, bool) {
    let binary = docqa_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    {
        let mut pipe = child.stdin.take().unwrap();
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_chunk_reference_layout() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 500\noverlap = 100");
    let doc = write_doc(&tmp, "plain.txt", &"a".repeat(1200));

    let (stdout, stderr, success) = run_docqa(&config_path, &["chunk", doc.to_str().unwrap()]);
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        stdout,
        "chunk_0  0  500\nchunk_1  400  500\nchunk_2  800  400\nfragments: 3\n"
    );
}

#[test]
fn test_chunk_flag_overrides() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "short.txt", "abcdefghij");

    let (stdout, _, success) = run_docqa(
        &config_path,
        &["chunk", doc.to_str().unwrap(), "--size", "4", "--overlap", "2"],
    );
    assert!(success);
    assert!(stdout.starts_with("chunk_0  0  4\nchunk_1  2  4\n"));
    assert!(stdout.ends_with("fragments: 5\n"), "got: {}", stdout);
}

#[test]
fn test_chunk_empty_file_has_no_fragments() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "empty.txt", "");

    let (stdout, _, success) = run_docqa(&config_path, &["chunk", doc.to_str().unwrap()]);
    assert!(success);
    assert_eq!(stdout, "fragments: 0\n");
}

#[test]
fn test_overlap_not_less_than_size_is_config_error() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 100\noverlap = 100");
    let doc = write_doc(&tmp, "plain.txt", "hello");

    let (_, stderr, success) = run_docqa(&config_path, &["chunk", doc.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("overlap (100) must be less than size (100)"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(&tmp, "plain.txt", "hello");
    let (_, stderr, success) = run_docqa(
        &tmp.path().join("nope.toml"),
        &["chunk", doc.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_unsupported_format_fails() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "notes.md", "# heading");

    let (_, stderr, success) = run_docqa(&config_path, &["ask", doc.to_str().unwrap(), "what?"]);
    assert!(!success);
    assert!(stderr.contains("unsupported file format: .md"), "stderr: {}", stderr);
}

#[test]
fn test_ask_returns_most_relevant_fragment() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 60\noverlap = 0");
    let text = format!(
        "{:<60}{:<60}{:<60}",
        "Cats sleep most of the afternoon.",
        "The warranty covers battery replacement.",
        "Rivers flow toward the sea."
    );
    let doc = write_doc(&tmp, "mixed.txt", &text);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &[
            "ask",
            doc.to_str().unwrap(),
            "What does the warranty cover? battery replacement",
            "--show-context",
        ],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("The warranty covers battery replacement."));
    assert!(stdout.contains("--- context (1 fragments) ---"));
    assert!(stdout.contains("[1] chunk_1 (distance"));
    assert!(!stdout.contains("Cats sleep"));
}

#[test]
fn test_ask_top_k_override() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 40\noverlap = 0");
    let doc = write_doc(&tmp, "doc.txt", WARRANTY_DOC);

    let (stdout, _, success) = run_docqa(
        &config_path,
        &[
            "ask",
            doc.to_str().unwrap(),
            "battery warranty",
            "--top-k",
            "3",
            "--show-context",
        ],
    );
    assert!(success);
    assert!(stdout.contains("--- context (3 fragments) ---"));
}

#[test]
fn test_ask_blank_question_fails() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "doc.txt", WARRANTY_DOC);

    let (_, stderr, success) = run_docqa(&config_path, &["ask", doc.to_str().unwrap(), "   "]);
    assert!(!success);
    assert!(stderr.contains("question is empty"), "stderr: {}", stderr);
}

#[test]
fn test_ask_punctuation_only_question_fails() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "doc.txt", WARRANTY_DOC);

    let (_, stderr, success) = run_docqa(&config_path, &["ask", doc.to_str().unwrap(), "???"]);
    assert!(!success);
    assert!(stderr.contains("question has no searchable terms"), "stderr: {}", stderr);
}

#[test]
fn test_document_with_punctuation_tail_is_answerable() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 500\noverlap = 100");
    let text = format!("{}).", "warranty ".repeat(89));
    let doc = write_doc(&tmp, "tail.txt", &text);

    let (stdout, stderr, success) = run_docqa(&config_path, &["info", doc.to_str().unwrap()]);
    assert!(success, "info failed: {}", stderr);
    assert!(stdout.contains("fragments: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("indexed: 2"), "stdout: {}", stdout);
}

#[test]
fn test_ask_on_empty_document_says_not_found() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "empty.txt", "");

    let (stdout, _, success) = run_docqa(&config_path, &["ask", doc.to_str().unwrap(), "anything?"]);
    assert!(success);
    assert!(stdout.contains("does not contain information"));
}

#[test]
fn test_info_reports_document_and_index() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 40\noverlap = 10\n\n[index]\ncollection_name = \"manuals\"");
    let doc = write_doc(&tmp, "doc.txt", WARRANTY_DOC);

    let (stdout, stderr, success) = run_docqa(&config_path, &["info", doc.to_str().unwrap()]);
    assert!(success, "info failed: {}", stderr);
    assert!(stdout.contains("format: txt"));
    assert!(stdout.contains("file: doc.txt"));
    assert!(stdout.contains("pages: 1"));
    assert!(stdout.contains("index: manuals (loaded)"));
    assert!(stdout.contains("dims: 384"));
    assert!(stdout.contains("embedding: hash"));
}

#[test]
fn test_chat_reads_questions_from_stdin() {
    let (tmp, config_path) = setup_test_env("[chunking]\nsize = 60\noverlap = 0");
    let text = format!(
        "{:<60}{:<60}",
        "The museum opens at ten every morning.", "Tickets cost twelve euros for adults."
    );
    let doc = write_doc(&tmp, "museum.txt", &text);

    let (stdout, stderr, success) = run_docqa_with_stdin(
        &config_path,
        &["chat", doc.to_str().unwrap()],
        Some("How much do tickets cost for adults?\n/info\n/clear\n/quit\n"),
    );
    assert!(success, "chat failed: {}", stderr);
    assert!(stdout.contains("Tickets cost twelve euros for adults."));
    assert!(stdout.contains("history: 2 messages"));
    assert!(stdout.contains("History cleared."));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    let (tmp, config_path) = setup_test_env("");
    let doc = write_doc(&tmp, "doc.txt", WARRANTY_DOC);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["--verbose", "chunk", doc.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.ends_with("fragments: 1\n"));
    assert!(stderr.contains("Extracted"), "stderr: {}", stderr);
}
