//! In-memory backend: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use inklink_core::error::PersistenceError;
use inklink_core::message::Message;
use inklink_core::persistence::ConversationPersistence;
use inklink_core::reference::PersistedReference;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory backend keyed by conversation id.
/// Also keeps chat history so usage breakdowns can be exercised in tests.
pub struct InMemoryPersistence {
    documents: Arc<RwLock<HashMap<String, Vec<PersistedReference>>>>,
    messages: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of conversations with a non-empty reference list.
    pub async fn conversation_count(&self) -> usize {
        self.documents
            .read()
            .await
            .values()
            .filter(|docs| !docs.is_empty())
            .count()
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationPersistence for InMemoryPersistence {
    fn name(&self) -> &str { "in_memory" }

    async fn get_context_documents(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<PersistedReference>, PersistenceError> {
        Ok(self
            .documents
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
        self.documents
            .write()
            .await
            .insert(conversation_id.to_string(), documents);
        Ok(())
    }

    async fn remove_context_document(
        &self,
        conversation_id: &str,
        document_id: &str,
    ) -> Result<(), PersistenceError> {
        if let Some(docs) = self.documents.write().await.get_mut(conversation_id) {
            docs.retain(|d| d.id != document_id);
        }
        Ok(())
    }

    async fn clear_context_documents(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        self.documents.write().await.remove(conversation_id);
        Ok(())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), PersistenceError> {
        self.messages
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, PersistenceError> {
        let messages = self.messages.read().await;
        let Some(history) = messages.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let skip = history.len().saturating_sub(limit);
        Ok(history[skip..].to_vec())
    }
}
