//! Agent state threaded through one workflow execution

use crate::conversation::{ConversationMessage, Message, Role};

/// Ordered working history of one request: the client history, the new user
/// message, and every assistant/tool message produced while the workflow runs.
///
/// Owned by exactly one workflow execution and dropped when it ends.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    messages: Vec<Message>,
}

impl AgentState {
    /// Create state from existing messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Build the initial state of a request
    pub fn from_request(
        system_prompt: Option<&str>,
        history: &[ConversationMessage],
        new_message: &str,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend(history.iter().cloned().map(Message::from));
        messages.push(Message::user(new_message));
        Self { messages }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently appended message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The final reply, if the last message is an assistant message without
    /// tool calls
    pub fn final_reply(&self) -> Option<&str> {
        self.last()
            .filter(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
