//! No-op persistence: reference lists live only as long as the process.

use async_trait::async_trait;
use inklink_core::error::PersistenceError;
use inklink_core::persistence::ConversationPersistence;
use inklink_core::reference::PersistedReference;

/// A persistence backend that stores nothing.
pub struct NoopPersistence;

#[async_trait]
impl ConversationPersistence for NoopPersistence {
    fn name(&self) -> &str { "none" }

    async fn get_context_documents(
        &self,
        _conversation_id: &str,
    ) -> Result<Vec<PersistedReference>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn set_context_documents(
        &self,
        _conversation_id: &str,
        _documents: Vec<PersistedReference>,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn remove_context_document(
        &self,
        _conversation_id: &str,
        _document_id: &str,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn clear_context_documents(&self, _conversation_id: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}
