//! Test doubles shared by unit tests.

use async_trait::async_trait;
use inklink_core::{DocumentError, DocumentId, DocumentMeta, DocumentStore, LinkGraph, NotificationSink};
use inklink_vault::MemoryVault;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

/// Collects notices instead of showing them.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, _duration: Duration) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// A vault that yields to the scheduler before every call, so concurrent
/// builds interleave at each suspension point.
pub struct YieldingVault {
    inner: MemoryVault,
}

impl YieldingVault {
    pub fn new(inner: MemoryVault) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DocumentStore for YieldingVault {
    async fn read(&self, id: &str) -> Result<String, DocumentError> {
        tokio::task::yield_now().await;
        self.inner.read(id).await
    }

    async fn exists(&self, id: &str) -> bool {
        tokio::task::yield_now().await;
        self.inner.exists(id).await
    }

    async fn list_all(&self) -> Result<Vec<DocumentMeta>, DocumentError> {
        self.inner.list_all().await
    }

    async fn resolve_by_name(&self, name: &str) -> Option<DocumentId> {
        tokio::task::yield_now().await;
        self.inner.resolve_by_name(name).await
    }
}

#[async_trait]
impl LinkGraph for YieldingVault {
    async fn outgoing_links(&self, id: &str) -> BTreeSet<DocumentId> {
        tokio::task::yield_now().await;
        self.inner.outgoing_links(id).await
    }

    async fn backlinks(&self, id: &str) -> BTreeSet<DocumentId> {
        tokio::task::yield_now().await;
        self.inner.backlinks(id).await
    }
}
