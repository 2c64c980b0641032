//! Append-only conversation history.

use crate::models::{ConversationMessage, Role};

/// Ordered list of user/assistant messages for the current document.
///
/// Messages are only ever appended; [`clear`](ConversationHistory::clear)
/// drops everything at once when the document changes.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ConversationMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ConversationMessage {
            role,
            content: content.into(),
        });
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(Role::User, content);
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(Role::Assistant, content);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// The last `n` messages, or all of them if there are fewer.
    pub fn last_n(&self, n: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
