//! In-memory vault: useful for testing and for hosts that already hold
//! note contents.

use async_trait::async_trait;
use inklink_core::{DocumentError, DocumentId, DocumentMeta, DocumentStore, LinkGraph};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::index::LinkIndex;
use crate::resolve::resolve_name;

/// A vault that stores notes in a sorted map.
///
/// The link index is rebuilt lazily after any mutation.
pub struct MemoryVault {
    documents: Arc<RwLock<BTreeMap<DocumentId, String>>>,
    index: Arc<RwLock<Option<LinkIndex>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(BTreeMap::new())),
            index: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a vault pre-populated with `(id, content)` pairs.
    pub fn with_documents<I, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = documents
            .into_iter()
            .map(|(id, content)| (id.into(), content.into()))
            .collect();
        Self {
            documents: Arc::new(RwLock::new(map)),
            index: Arc::new(RwLock::new(None)),
        }
    }

    /// Insert or replace a note.
    pub async fn insert(&self, id: impl Into<String>, content: impl Into<String>) {
        self.documents.write().await.insert(id.into(), content.into());
        *self.index.write().await = None;
    }

    /// Delete a note. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.documents.write().await.remove(id).is_some();
        if removed {
            *self.index.write().await = None;
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn with_index<T>(&self, f: impl FnOnce(&LinkIndex) -> T) -> T {
        if let Some(index) = self.index.read().await.as_ref() {
            return f(index);
        }
        // Hold the document lock until the index is stored so a concurrent
        // insert cannot be overwritten by an index built before it.
        let documents = self.documents.read().await;
        let built = LinkIndex::build(&documents);
        let result = f(&built);
        *self.index.write().await = Some(built);
        drop(documents);
        result
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryVault {
    async fn read(&self, id: &str) -> Result<String, DocumentError> {
        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> bool {
        self.documents.read().await.contains_key(id)
    }

    async fn list_all(&self) -> Result<Vec<DocumentMeta>, DocumentError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .map(|(id, content)| DocumentMeta::new(id.clone(), content.chars().count()))
            .collect())
    }

    async fn resolve_by_name(&self, name: &str) -> Option<DocumentId> {
        resolve_name(self.documents.read().await.keys(), name)
    }
}

#[async_trait]
impl LinkGraph for MemoryVault {
    async fn outgoing_links(&self, id: &str) -> BTreeSet<DocumentId> {
        self.with_index(|index| index.outgoing(id)).await
    }

    async fn backlinks(&self, id: &str) -> BTreeSet<DocumentId> {
        self.with_index(|index| index.backlinks(id)).await
    }
}
