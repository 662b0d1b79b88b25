//! File-based persistence: JSON-lines storage.
//!
//! Each line is one context reference tagged with its conversation:
//! `{"conversationId":"Doc1.md","id":"Doc2.md","addedAt":"..."}`.
//! Line order within a conversation is display order.
//!
//! Storage location: `~/.inklink/context.jsonl`

use async_trait::async_trait;
use inklink_core::error::PersistenceError;
use inklink_core::persistence::ConversationPersistence;
use inklink_core::reference::PersistedReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    conversation_id: String,
    #[serde(flatten)]
    reference: PersistedReference,
}

/// A file-backed persistence store using JSONL (one JSON object per line).
///
/// Lists are loaded into memory on creation and flushed to disk on every
/// mutation. This gives fast reads with durable writes.
pub struct FilePersistence {
    path: PathBuf,
    conversations: Arc<RwLock<BTreeMap<String, Vec<PersistedReference>>>>,
}

impl FilePersistence {
    /// Create a new file-based backend at the given path.
    ///
    /// If the file exists, lists are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let conversations = Self::load_from_disk(&path);
        debug!(path = %path.display(), conversations = conversations.len(), "File persistence loaded");
        Self {
            path,
            conversations: Arc::new(RwLock::new(conversations)),
        }
    }

    /// Load lists from a JSONL file.
    fn load_from_disk(path: &Path) -> BTreeMap<String, Vec<PersistedReference>> {
        let mut conversations: BTreeMap<String, Vec<PersistedReference>> = BTreeMap::new();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return conversations, // File doesn't exist yet: start empty
        };

        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<Record>(line) {
                Ok(record) => conversations
                    .entry(record.conversation_id)
                    .or_default()
                    .push(record.reference),
                Err(e) => warn!(error = %e, "Skipping corrupted context record"),
            }
        }
        conversations
    }

    /// Flush all lists to disk as JSONL.
    async fn flush(&self) -> Result<(), PersistenceError> {
        let conversations = self.conversations.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Storage(format!("Failed to create storage directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for (conversation_id, references) in conversations.iter() {
            for reference in references {
                let record = Record {
                    conversation_id: conversation_id.clone(),
                    reference: reference.clone(),
                };
                let line = serde_json::to_string(&record).map_err(|e| {
                    PersistenceError::Storage(format!("Failed to serialize context record: {e}"))
                })?;
                content.push_str(&line);
                content.push('\n');
            }
        }

        std::fs::write(&self.path, &content).map_err(|e| {
            PersistenceError::Storage(format!("Failed to write context file: {e}"))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ConversationPersistence for FilePersistence {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_context_documents(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<PersistedReference>, PersistenceError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_context_documents(
        &self,
        conversation_id: &str,
        documents: Vec<PersistedReference>,
    ) -> Result<(), PersistenceError> {
        {
            let mut conversations = self.conversations.write().await;
            if documents.is_empty() {
                conversations.remove(conversation_id);
            } else {
                conversations.insert(conversation_id.to_string(), documents);
            }
        }
        self.flush().await
    }

    async fn remove_context_document(
        &self,
        conversation_id: &str,
        document_id: &str,
    ) -> Result<(), PersistenceError> {
        let removed = {
            let mut conversations = self.conversations.write().await;
            match conversations.get_mut(conversation_id) {
                Some(references) => {
                    let before = references.len();
                    references.retain(|r| r.id != document_id);
                    let removed = references.len() < before;
                    if references.is_empty() {
                        conversations.remove(conversation_id);
                    }
                    removed
                }
                None => false,
            }
        };
        if removed {
            self.flush().await?;
        }
        Ok(())
    }

    async fn clear_context_documents(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        let removed = self
            .conversations
            .write()
            .await
            .remove(conversation_id)
            .is_some();
        if removed {
            self.flush().await?;
        }
        Ok(())
    }
}
