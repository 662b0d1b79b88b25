//! Document store and link graph traits.
//!
//! A document is a note in the user's workspace, addressed by a stable
//! identifier (its `/`-separated path relative to the vault root). The
//! store answers "what does this note say" and "does it still exist";
//! the link graph answers "what does it link to" and "who links to it".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::DocumentError;

/// Stable identifier of a document, e.g. `projects/Roadmap.md`.
pub type DocumentId = String;

/// Listing entry returned by [`DocumentStore::list_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub name: String,
    /// Content length in characters.
    pub length: usize,
}

impl DocumentMeta {
    pub fn new(id: impl Into<String>, length: usize) -> Self {
        let id = id.into();
        Self {
            name: display_name(&id),
            id,
            length,
        }
    }
}

/// Read access to the user's documents.
///
/// Implementations: in-memory vault (tests, embedding), filesystem vault.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document's full content.
    async fn read(&self, id: &str) -> Result<String, DocumentError>;

    /// Whether a document with this id currently exists.
    async fn exists(&self, id: &str) -> bool;

    /// All documents, sorted by id.
    async fn list_all(&self) -> Result<Vec<DocumentMeta>, DocumentError>;

    /// Resolve a user-typed name to a document id. `None` when nothing matches.
    async fn resolve_by_name(&self, name: &str) -> Option<DocumentId>;
}

/// Link adjacency between documents.
#[async_trait]
pub trait LinkGraph: Send + Sync {
    /// Documents the given document links to.
    async fn outgoing_links(&self, id: &str) -> BTreeSet<DocumentId>;

    /// Documents that link to the given document.
    async fn backlinks(&self, id: &str) -> BTreeSet<DocumentId>;
}

/// Human-facing name of a document: its file stem.
///
/// `notes/Doc2.md` → `Doc2`, `Doc1` → `Doc1`.
pub fn display_name(id: &str) -> String {
    let file = id.rsplit('/').next().unwrap_or(id);
    match file.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_dirs_and_extension() {
        assert_eq!(display_name("notes/Doc2.md"), "Doc2");
        assert_eq!(display_name("Doc1"), "Doc1");
        assert_eq!(display_name("a/b/c.v2.md"), "c.v2");
    }

    #[test]
    fn display_name_keeps_dotfiles() {
        assert_eq!(display_name(".hidden"), ".hidden");
    }

    #[test]
    fn meta_derives_name() {
        let meta = DocumentMeta::new("x/Plan.md", 12);
        assert_eq!(meta.name, "Plan");
        assert_eq!(meta.length, 12);
    }
}
