//! Link-graph index: outgoing links and their reverse, backlinks.

use inklink_core::DocumentId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::links::{LinkTarget, extract_links, join_relative};
use crate::resolve::resolve_name;

/// Adjacency computed from a snapshot of note contents.
///
/// Targets that do not resolve to a known note, and links from a note to
/// itself, are not recorded.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    outgoing: HashMap<DocumentId, BTreeSet<DocumentId>>,
    backlinks: HashMap<DocumentId, BTreeSet<DocumentId>>,
}

impl LinkIndex {
    /// Build the index from `id → content`.
    pub fn build(documents: &BTreeMap<DocumentId, String>) -> Self {
        let ids: Vec<&DocumentId> = documents.keys().collect();
        let mut index = Self::default();

        for (source, content) in documents {
            for target in extract_links(content) {
                let resolved = match target {
                    LinkTarget::Name(name) => resolve_name(ids.iter().copied(), &name),
                    LinkTarget::RelativePath(path) => join_relative(source, &path)
                        .and_then(|joined| resolve_name(ids.iter().copied(), &joined)),
                };
                let Some(target_id) = resolved else {
                    continue;
                };
                if &target_id == source {
                    continue;
                }
                index
                    .backlinks
                    .entry(target_id.clone())
                    .or_default()
                    .insert(source.clone());
                index
                    .outgoing
                    .entry(source.clone())
                    .or_default()
                    .insert(target_id);
            }
        }

        index
    }

    pub fn outgoing(&self, id: &str) -> BTreeSet<DocumentId> {
        self.outgoing.get(id).cloned().unwrap_or_default()
    }

    pub fn backlinks(&self, id: &str) -> BTreeSet<DocumentId> {
        self.backlinks.get(id).cloned().unwrap_or_default()
    }

    /// Number of notes with at least one outgoing link.
    pub fn linking_documents(&self) -> usize {
        self.outgoing.len()
    }
}
