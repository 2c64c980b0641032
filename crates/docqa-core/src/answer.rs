//! Answer generation contract.
//!
//! The session hands the retrieved context, the question and the
//! conversation so far to an [`AnswerGenerator`]. Prompt construction and
//! the language-model call belong to the implementation.

use async_trait::async_trait;

use crate::error::GenerateError;
use crate::models::ConversationMessage;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Identifier of the backing model (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Produce an answer grounded in `context`.
    async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ConversationMessage],
    ) -> Result<String, GenerateError>;
}
