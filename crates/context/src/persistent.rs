//! Persistent context store: the per-conversation ordered reference list.
//!
//! The in-memory map is a cache over [`ConversationPersistence`], which is
//! the source of truth across restarts. A conversation is loaded on first
//! touch; stale rows found while loading are dropped from both the cache
//! and durable storage, and their ids are kept so the caller can report
//! them.
//!
//! Only manual references are written to durable storage. Auto-sourced
//! rows are re-derived from the link graph and live only in the cache.

use inklink_core::{ConversationPersistence, DocumentReference, DocumentStore, PersistenceError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::validator;

#[derive(Default)]
struct StoreState {
    lists: HashMap<String, Vec<DocumentReference>>,
    restored_missing: HashMap<String, Vec<String>>,
}

pub struct PersistentContextStore {
    persistence: Arc<dyn ConversationPersistence>,
    documents: Arc<dyn DocumentStore>,
    state: Mutex<StoreState>,
    /// Serializes durable writes so the last write carries the latest list.
    writes: tokio::sync::Mutex<()>,
}

impl PersistentContextStore {
    pub fn new(
        persistence: Arc<dyn ConversationPersistence>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            persistence,
            documents,
            state: Mutex::new(StoreState::default()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // Never held across an await, so a poisoned lock only means a
        // panic mid-update of plain maps.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ordered references for a conversation.
    pub async fn get(&self, conversation_id: &str) -> Result<Vec<DocumentReference>, PersistenceError> {
        self.ensure_loaded(conversation_id).await?;
        Ok(self.cached(conversation_id).unwrap_or_default())
    }

    /// The cached list, without touching durable storage.
    pub fn cached(&self, conversation_id: &str) -> Option<Vec<DocumentReference>> {
        self.state().lists.get(conversation_id).cloned()
    }

    /// Load a conversation from durable storage unless already cached.
    pub async fn ensure_loaded(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        if self.state().lists.contains_key(conversation_id) {
            return Ok(());
        }

        let persisted = self.persistence.get_context_documents(conversation_id).await?;
        let restored: Vec<DocumentReference> = persisted
            .into_iter()
            .map(|p| p.into_reference())
            .filter(|r| r.document_id != conversation_id)
            .collect();
        let validation = validator::validate(self.documents.as_ref(), restored).await;

        let loaded = {
            let mut state = self.state();
            if state.lists.contains_key(conversation_id) {
                false
            } else {
                state
                    .lists
                    .insert(conversation_id.to_string(), validation.valid);
                if !validation.missing.is_empty() {
                    state
                        .restored_missing
                        .entry(conversation_id.to_string())
                        .or_default()
                        .extend(validation.missing.iter().cloned());
                }
                true
            }
        };

        if loaded {
            debug!(
                conversation = conversation_id,
                dropped = validation.missing.len(),
                "Restored context references"
            );
            if !validation.missing.is_empty() {
                self.persist(conversation_id).await?;
            }
        }
        Ok(())
    }

    /// Add a reference. Returns whether the persistent set changed.
    ///
    /// Adding the conversation's own document or an id already present is
    /// a no-op, except that a manual add over an auto-sourced row promotes
    /// that row to manual in place.
    pub async fn add(
        &self,
        conversation_id: &str,
        reference: DocumentReference,
    ) -> Result<bool, PersistenceError> {
        if reference.document_id == conversation_id {
            return Ok(false);
        }
        self.ensure_loaded(conversation_id).await?;

        let changed = {
            let mut state = self.state();
            let list = state.lists.entry(conversation_id.to_string()).or_default();
            match list
                .iter_mut()
                .find(|r| r.document_id == reference.document_id)
            {
                Some(existing) if existing.source.is_auto() && !reference.source.is_auto() => {
                    existing.source = reference.source;
                    if existing.property.is_none() {
                        existing.property = reference.property;
                    }
                    true
                }
                Some(_) => false,
                None => {
                    let manual = !reference.source.is_auto();
                    list.push(reference);
                    manual
                }
            }
        };

        if changed {
            self.persist(conversation_id).await?;
        }
        Ok(changed)
    }

    /// Remove one document from a conversation. Returns whether it was present.
    pub async fn remove(
        &self,
        conversation_id: &str,
        document_id: &str,
    ) -> Result<bool, PersistenceError> {
        self.ensure_loaded(conversation_id).await?;
        let removed = {
            let mut state = self.state();
            match state.lists.get_mut(conversation_id) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|r| r.document_id != document_id);
                    list.len() < before
                }
                None => false,
            }
        };
        if removed {
            let _guard = self.writes.lock().await;
            self.persistence
                .remove_context_document(conversation_id, document_id)
                .await?;
        }
        Ok(removed)
    }

    /// Remove several documents at once. Returns the ids actually removed.
    pub async fn remove_all(
        &self,
        conversation_id: &str,
        document_ids: &[String],
    ) -> Result<Vec<String>, PersistenceError> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_loaded(conversation_id).await?;
        let removed: Vec<String> = {
            let mut state = self.state();
            let Some(list) = state.lists.get_mut(conversation_id) else {
                return Ok(Vec::new());
            };
            let removed = list
                .iter()
                .filter(|r| document_ids.contains(&r.document_id))
                .map(|r| r.document_id.clone())
                .collect();
            list.retain(|r| !document_ids.contains(&r.document_id));
            removed
        };
        if !removed.is_empty() {
            self.persist(conversation_id).await?;
        }
        Ok(removed)
    }

    /// Empty a conversation's list. The conversation stays loaded.
    pub async fn clear(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        {
            let mut state = self.state();
            state.lists.insert(conversation_id.to_string(), Vec::new());
            state.restored_missing.remove(conversation_id);
        }
        let _guard = self.writes.lock().await;
        self.persistence.clear_context_documents(conversation_id).await
    }

    /// Forget a conversation entirely, in memory and on disk.
    pub async fn destroy(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        {
            let mut state = self.state();
            state.lists.remove(conversation_id);
            state.restored_missing.remove(conversation_id);
        }
        let _guard = self.writes.lock().await;
        self.persistence.clear_context_documents(conversation_id).await
    }

    /// Swap the auto-sourced rows of a conversation for `auto`.
    ///
    /// Rows keep their insertion position: auto rows still in `auto` stay
    /// where they are, auto rows no longer in it are dropped, and new ids
    /// are appended. Ids already present as manual rows, or naming the
    /// conversation's own document, are skipped.
    pub async fn replace_auto_sourced(
        &self,
        conversation_id: &str,
        auto: Vec<DocumentReference>,
    ) -> Result<(), PersistenceError> {
        self.ensure_loaded(conversation_id).await?;
        let mut state = self.state();
        let list = state.lists.entry(conversation_id.to_string()).or_default();
        list.retain(|r| {
            !r.source.is_auto() || auto.iter().any(|a| a.document_id == r.document_id)
        });
        for reference in auto {
            if reference.document_id == conversation_id {
                continue;
            }
            match list
                .iter_mut()
                .find(|r| r.document_id == reference.document_id)
            {
                // Same id, possibly reached through the other link direction
                Some(existing) if existing.source.is_auto() => existing.source = reference.source,
                Some(_) => {}
                None => list.push(reference),
            }
        }
        Ok(())
    }

    /// Ids dropped as stale while loading, since the last call.
    pub fn take_restored_missing(&self, conversation_id: &str) -> Vec<String> {
        self.state()
            .restored_missing
            .remove(conversation_id)
            .unwrap_or_default()
    }

    /// Put back stale ids that were taken but never reported.
    pub fn defer_missing(&self, conversation_id: &str, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state();
        let pending = state
            .restored_missing
            .entry(conversation_id.to_string())
            .or_default();
        for id in ids {
            if !pending.contains(&id) {
                pending.push(id);
            }
        }
    }

    /// Conversations currently cached, sorted.
    pub fn open_conversations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().lists.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn persist(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        let _guard = self.writes.lock().await;
        let snapshot = {
            let state = self.state();
            state
                .lists
                .get(conversation_id)
                .map(|list| {
                    list.iter()
                        .filter(|r| !r.source.is_auto())
                        .map(DocumentReference::to_persisted)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        self.persistence
            .set_context_documents(conversation_id, snapshot)
            .await
            .inspect_err(|e| warn!(conversation = conversation_id, error = %e, "Failed to persist context references"))
    }
}
