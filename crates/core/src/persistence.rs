//! Conversation persistence trait: durable home of context reference lists.
//!
//! The persistent context store keeps an in-memory cache, but durable
//! storage is the source of truth across process restarts. Conversations
//! are keyed by their working document's id.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::message::Message;
use crate::reference::PersistedReference;

/// The core ConversationPersistence trait.
///
/// Implementations: SQLite, JSON-lines file, in-memory (for testing), none (no-op).
#[async_trait]
pub trait ConversationPersistence: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "none").
    fn name(&self) -> &str;

    /// Ordered reference list for a conversation (empty when unknown).
    async fn get_context_documents(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<PersistedReference>, PersistenceError>;

    /// Replace a conversation's reference list.
    async fn set_context_documents(
        &self,
        conversation_id: &str,
        documents: Vec<PersistedReference>,
    ) -> Result<(), PersistenceError>;

    /// Remove one document from a conversation's list.
    async fn remove_context_document(
        &self,
        conversation_id: &str,
        document_id: &str,
    ) -> Result<(), PersistenceError>;

    /// Drop a conversation's whole list.
    async fn clear_context_documents(&self, conversation_id: &str)
    -> Result<(), PersistenceError>;

    /// Record a chat message for usage accounting.
    async fn append_message(
        &self,
        _conversation_id: &str,
        _message: Message,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// Most recent `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        _conversation_id: &str,
        _limit: usize,
    ) -> Result<Vec<Message>, PersistenceError> {
        Ok(Vec::new())
    }
}
