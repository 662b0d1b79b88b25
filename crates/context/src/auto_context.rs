//! Auto-context: references derived from link-graph adjacency.

use inklink_core::{AutoContextOptions, DocumentReference, DocumentStore, LinkGraph, ReferenceSource};
use std::sync::Arc;
use tracing::debug;

/// Derives outgoing-link and backlink references for a working document.
pub struct AutoContextService {
    documents: Arc<dyn DocumentStore>,
    graph: Arc<dyn LinkGraph>,
}

impl AutoContextService {
    pub fn new(documents: Arc<dyn DocumentStore>, graph: Arc<dyn LinkGraph>) -> Self {
        Self { documents, graph }
    }

    /// Collect auto references for `working`.
    ///
    /// Outgoing links come first, then backlinks. The working document
    /// itself, documents that no longer exist, and ids already collected
    /// are skipped, so a document that is both linked and linking appears
    /// once as an outgoing link.
    pub async fn collect(
        &self,
        working: &str,
        options: AutoContextOptions,
    ) -> Vec<DocumentReference> {
        let mut collected: Vec<DocumentReference> = Vec::new();
        if !options.is_enabled() {
            return collected;
        }

        let mut candidates = Vec::new();
        if options.include_outgoing {
            candidates.extend(
                self.graph
                    .outgoing_links(working)
                    .await
                    .into_iter()
                    .map(|id| (id, ReferenceSource::OutgoingLink)),
            );
        }
        if options.include_backlinks {
            candidates.extend(
                self.graph
                    .backlinks(working)
                    .await
                    .into_iter()
                    .map(|id| (id, ReferenceSource::Backlink)),
            );
        }

        for (id, source) in candidates {
            if id == working || collected.iter().any(|r| r.document_id == id) {
                continue;
            }
            if !self.documents.exists(&id).await {
                continue;
            }
            collected.push(DocumentReference::new(id, source));
        }

        debug!(working, count = collected.len(), "Collected auto-context references");
        collected
    }
}
