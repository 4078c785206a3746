//! Conversation persistence
//!
//! The coordinator appends the user's message when a request starts and the
//! final assistant reply once the stream is done. Stores are shared by all
//! sessions and passed in explicitly at startup.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{ConversationMessage, ConversationRole};
use crate::core::{ChatError, ChatResult};

/// Default directory for conversation storage
const CONVERSATIONS_DIR: &str = "conversations";

/// One persisted conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub role: ConversationRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(message: &ConversationMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: message.role,
            content: message.content.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn to_conversation_message(&self) -> ConversationMessage {
        ConversationMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Persistence collaborator
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one message to a conversation
    async fn append(&self, conversation_id: &str, message: &ConversationMessage) -> ChatResult<()>;
}

/// Longest accepted conversation id
pub const MAX_CONVERSATION_ID_LEN: usize = 128;

/// Whether `conversation_id` can name a conversation on disk
///
/// Only ASCII letters, digits, `-` and `_` are allowed, so an id can never
/// escape the storage directory.
pub fn is_valid_conversation_id(conversation_id: &str) -> bool {
    !conversation_id.is_empty()
        && conversation_id.len() <= MAX_CONVERSATION_ID_LEN
        && conversation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_conversation_id(conversation_id: &str) -> ChatResult<()> {
    if is_valid_conversation_id(conversation_id) {
        Ok(())
    } else {
        Err(ChatError::Persistence(format!(
            "Invalid conversation id: {:?}",
            conversation_id
        )))
    }
}

/// Stores each conversation as `<base_dir>/<conversation_id>/history.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlConversationStore {
    base_dir: PathBuf,
}

impl JsonlConversationStore {
    /// Create a store under the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(CONVERSATIONS_DIR),
        }
    }

    /// Create a store under a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the directory path for a conversation
    pub fn conversation_dir(&self, conversation_id: &str) -> PathBuf {
        self.base_dir.join(conversation_id)
    }

    /// Get the history file path for a conversation
    pub fn history_path(&self, conversation_id: &str) -> PathBuf {
        self.conversation_dir(conversation_id).join("history.jsonl")
    }

    /// Append a record to the history file, creating it if needed
    pub fn append_record(&self, conversation_id: &str, record: &StoredMessage) -> ChatResult<()> {
        validate_conversation_id(conversation_id)?;
        fs::create_dir_all(self.conversation_dir(conversation_id))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(conversation_id))?;

        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Load all records of a conversation (empty if it does not exist)
    pub fn load(&self, conversation_id: &str) -> ChatResult<Vec<StoredMessage>> {
        validate_conversation_id(conversation_id)?;
        let path = self.history_path(conversation_id);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }

    /// List conversation ids that have a history file
    pub fn list_conversations(&self) -> ChatResult<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut conversations = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if self.history_path(name).exists() {
                    conversations.push(name.to_string());
                }
            }
        }

        conversations.sort();
        Ok(conversations)
    }
}

impl Default for JsonlConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for JsonlConversationStore {
    async fn append(&self, conversation_id: &str, message: &ConversationMessage) -> ChatResult<()> {
        let store = self.clone();
        let conversation_id = conversation_id.to_string();
        let record = StoredMessage::new(message);

        tokio::task::spawn_blocking(move || store.append_record(&conversation_id, &record))
            .await
            .map_err(|e| ChatError::Persistence(format!("Storage task failed: {}", e)))?
    }
}

/// In-process store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<StoredMessage>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of a conversation in append order
    pub fn messages(&self, conversation_id: &str) -> Vec<ConversationMessage> {
        self.conversations
            .lock()
            .map(|map| {
                map.get(conversation_id)
                    .map(|records| records.iter().map(StoredMessage::to_conversation_message).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(&self, conversation_id: &str, message: &ConversationMessage) -> ChatResult<()> {
        let mut map = self
            .conversations
            .lock()
            .map_err(|_| ChatError::Persistence("Store lock poisoned".into()))?;
        map.entry(conversation_id.to_string())
            .or_default()
            .push(StoredMessage::new(message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonlConversationStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlConversationStore::with_dir(temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let (store, _temp) = create_test_store();

        store
            .append("chat-1", &ConversationMessage::user("2+2?"))
            .await
            .unwrap();
        store
            .append("chat-1", &ConversationMessage::assistant("4"))
            .await
            .unwrap();

        let records = store.load("chat-1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, ConversationRole::User);
        assert_eq!(records[1].content, "4");
        assert_ne!(records[0].id, records[1].id);
        assert!(records[0].created_at <= records[1].created_at);
    }

    #[test]
    fn test_load_missing_conversation() {
        let (store, _temp) = create_test_store();
        assert!(store.load("nothing-here").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let (store, _temp) = create_test_store();
        for id in ["", "../escape", "a/b", "dot.dot"] {
            let result = store.append(id, &ConversationMessage::user("x")).await;
            assert!(matches!(result, Err(ChatError::Persistence(_))), "id {:?}", id);
        }
    }

    #[test]
    fn test_list_conversations() {
        let (store, _temp) = create_test_store();
        let record = StoredMessage::new(&ConversationMessage::user("hi"));
        store.append_record("b", &record).unwrap();
        store.append_record("a", &record).unwrap();

        assert_eq!(store.list_conversations().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryConversationStore::new();
        store.append("c", &ConversationMessage::user("hi")).await.unwrap();
        store.append("c", &ConversationMessage::assistant("hello")).await.unwrap();

        assert_eq!(
            store.messages("c"),
            vec![
                ConversationMessage::user("hi"),
                ConversationMessage::assistant("hello")
            ]
        );
        assert!(store.messages("other").is_empty());
    }
}
