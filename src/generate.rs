//! Answer generation.
//!
//! Builds the grounded prompt and implements
//! [`docqa_core::answer::AnswerGenerator`] for the configured backend:
//!
//! | `generation.provider` | backend |
//! |-----------------------|---------|
//! | `"extractive"` | [`ExtractiveGenerator`], offline, returns the retrieved passages |
//! | `"gemini"` | [`GeminiGenerator`], Google `generateContent` REST API |
//! | `"ollama"` | [`OllamaGenerator`], `POST /api/generate` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use docqa_core::answer::AnswerGenerator;
use docqa_core::models::ConversationMessage;
use docqa_core::GenerateError;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::embedding::DEFAULT_OLLAMA_URL;
use crate::http::{build_client, post_json, JsonRequest};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Answer returned when retrieval found nothing to ground on.
pub const NOT_IN_DOCUMENT: &str = "The document does not contain information to answer this question.";

/// Render the conversation so far, one `role: content` line per message.
pub fn format_history(history: &[ConversationMessage]) -> String {
    if history.is_empty() {
        return "No previous history.".to_string();
    }

    history
        .iter()
        .map(|msg| format!("{}: {}\n", msg.role, msg.content))
        .collect()
}

/// Build the full prompt sent to a language model.
pub fn build_prompt(context: &str, question: &str, history: &[ConversationMessage]) -> String {
    format!(
        "You are an assistant that answers using the document context and the history of our conversation.
If the answer is not in the context, say so clearly.

CONVERSATION HISTORY:
{history}

DOCUMENT CONTEXT:
{context}

CURRENT QUESTION:
{question}

Instructions:
- Answer clearly and concisely
- If the information is not in the context, say so honestly
- Use earlier answers from the history when they help
- Keep a friendly, professional tone
",
        history = format_history(history),
        context = context,
        question = question,
    )
}

// ============ Extractive ============

/// Offline generator: answers with the retrieved passages verbatim.
pub struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    fn model_name(&self) -> &str {
        "extractive"
    }

    async fn generate(
        &self,
        context: &str,
        _question: &str,
        _history: &[ConversationMessage],
    ) -> Result<String, GenerateError> {
        let context = context.trim();
        if context.is_empty() {
            return Ok(NOT_IN_DOCUMENT.to_string());
        }
        Ok(context.to_string())
    }
}

// ============ Gemini ============

/// Google Gemini via the REST `generateContent` endpoint.
///
/// Requires `GOOGLE_API_KEY` in the environment.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable not set"))?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ConversationMessage],
    ) -> Result<String, GenerateError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_prompt(context, question, history) }]
            }]
        });
        let request = JsonRequest {
            service: "Gemini",
            url: &url,
            headers: vec![("x-goog-api-key", self.api_key.clone())],
            body: &body,
        };

        let json = post_json(&self.client, &request, self.max_retries)
            .await
            .map_err(|e| GenerateError::Request(format!("{:#}", e)))?;
        let text = parse_gemini_response(&json)?;
        debug!("Gemini answered with {} chars", text.len());
        Ok(text)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, GenerateError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates");
            GenerateError::InvalidResponse(format!("Gemini returned no answer: {}", reason))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(GenerateError::InvalidResponse(
            "Gemini returned an empty answer".to_string(),
        ));
    }
    Ok(text)
}

// ============ Ollama ============

/// A local Ollama model via `POST /api/generate` with `stream = false`.
pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ConversationMessage],
    ) -> Result<String, GenerateError> {
        let endpoint = format!("{}/api/generate", self.url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(context, question, history),
            "stream": false,
        });
        let request = JsonRequest {
            service: "Ollama",
            url: &endpoint,
            headers: Vec::new(),
            body: &body,
        };

        let json = post_json(&self.client, &request, self.max_retries)
            .await
            .map_err(|e| {
                GenerateError::Request(format!("{:#} (is Ollama running at {}?)", e, self.url))
            })?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| {
                GenerateError::InvalidResponse("Ollama response missing 'response' field".into())
            })
    }
}

/// Create the [`AnswerGenerator`] named by `generation.provider`.
///
/// # Errors
///
/// Unknown provider names, or a provider that cannot be initialized
/// (missing API key or model).
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "extractive" => Ok(Box::new(ExtractiveGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
