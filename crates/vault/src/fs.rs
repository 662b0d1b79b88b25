//! Filesystem vault: a directory of markdown notes.
//!
//! Document ids are `/`-separated paths relative to the vault root
//! (`projects/Plan.md`). Hidden files and directories (`.git`, `.obsidian`)
//! are skipped. Reads always hit the disk; the link index is a snapshot
//! taken on [`FsVault::open`] and on every [`FsVault::refresh`].

use async_trait::async_trait;
use inklink_core::{DocumentError, DocumentId, DocumentMeta, DocumentStore, LinkGraph};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::index::LinkIndex;
use crate::resolve::resolve_name;

const NOTE_EXTENSION: &str = "md";

pub struct FsVault {
    root: PathBuf,
    index: Arc<RwLock<LinkIndex>>,
}

impl FsVault {
    /// Open a vault rooted at `root` and index its links.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DocumentError::InvalidPath(format!(
                "vault root {} is not a directory",
                root.display()
            )));
        }
        let vault = Self {
            root,
            index: Arc::new(RwLock::new(LinkIndex::default())),
        };
        vault.refresh().await?;
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-read every note and rebuild the link index.
    pub async fn refresh(&self) -> Result<(), DocumentError> {
        let mut documents = BTreeMap::new();
        for id in self.scan_ids() {
            match tokio::fs::read_to_string(self.root.join(&id)).await {
                Ok(content) => {
                    documents.insert(id, content);
                }
                Err(e) => warn!(document = %id, error = %e, "Skipping unreadable note"),
            }
        }
        let index = LinkIndex::build(&documents);
        debug!(
            root = %self.root.display(),
            notes = documents.len(),
            linking = index.linking_documents(),
            "Vault indexed"
        );
        *self.index.write().await = index;
        Ok(())
    }

    /// All note ids under the root, sorted.
    fn scan_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable vault entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == NOTE_EXTENSION)
            })
            .filter_map(|entry| self.id_for(entry.path()))
            .collect();
        ids.sort();
        ids
    }

    fn id_for(&self, path: &Path) -> Option<DocumentId> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Map an id to a path inside the root, rejecting traversal.
    fn path_for(&self, id: &str) -> Result<PathBuf, DocumentError> {
        if id.is_empty() || id.contains('\\') {
            return Err(DocumentError::InvalidPath(id.to_string()));
        }
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(DocumentError::InvalidPath(id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[async_trait]
impl DocumentStore for FsVault {
    async fn read(&self, id: &str) -> Result<String, DocumentError> {
        let path = self.path_for(id)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound(id.to_string())
            } else {
                DocumentError::Io {
                    id: id.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    async fn exists(&self, id: &str) -> bool {
        let Ok(path) = self.path_for(id) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn list_all(&self) -> Result<Vec<DocumentMeta>, DocumentError> {
        let mut all = Vec::new();
        for id in self.scan_ids() {
            let length = match tokio::fs::read_to_string(self.root.join(&id)).await {
                Ok(content) => content.chars().count(),
                Err(_) => continue,
            };
            all.push(DocumentMeta::new(id, length));
        }
        Ok(all)
    }

    async fn resolve_by_name(&self, name: &str) -> Option<DocumentId> {
        let ids = self.scan_ids();
        resolve_name(&ids, name)
    }
}

#[async_trait]
impl LinkGraph for FsVault {
    async fn outgoing_links(&self, id: &str) -> BTreeSet<DocumentId> {
        self.index.read().await.outgoing(id)
    }

    async fn backlinks(&self, id: &str) -> BTreeSet<DocumentId> {
        self.index.read().await.backlinks(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn sample_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Doc1.md", "# Doc1\nSee [[Doc2]]");
        write(tmp.path(), "projects/Doc2.md", "Back to [Doc1](../Doc1.md)");
        write(tmp.path(), ".obsidian/workspace.md", "[[Doc1]]");
        write(tmp.path(), "image.png", "not a note");
        tmp
    }

    #[tokio::test]
    async fn open_indexes_visible_notes_only() {
        let tmp = sample_dir();
        let vault = FsVault::open(tmp.path()).await.unwrap();

        let ids: Vec<_> = vault
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["Doc1.md", "projects/Doc2.md"]);

        assert!(vault.outgoing_links("Doc1.md").await.contains("projects/Doc2.md"));
        let back = vault.backlinks("Doc1.md").await;
        assert_eq!(back.into_iter().collect::<Vec<_>>(), vec!["projects/Doc2.md"]);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let tmp = sample_dir();
        let vault = FsVault::open(tmp.path()).await.unwrap();
        assert!(matches!(
            vault.read("Ghost.md").await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn traversal_ids_rejected() {
        let tmp = sample_dir();
        let vault = FsVault::open(tmp.path()).await.unwrap();
        assert!(matches!(
            vault.read("../etc/passwd").await,
            Err(DocumentError::InvalidPath(_))
        ));
        assert!(matches!(
            vault.read("/etc/passwd").await,
            Err(DocumentError::InvalidPath(_))
        ));
        assert!(!vault.exists("../Doc1.md").await);
    }

    #[tokio::test]
    async fn deletion_visible_without_refresh() {
        let tmp = sample_dir();
        let vault = FsVault::open(tmp.path()).await.unwrap();
        assert!(vault.exists("projects/Doc2.md").await);

        std::fs::remove_file(tmp.path().join("projects/Doc2.md")).unwrap();
        assert!(!vault.exists("projects/Doc2.md").await);
        assert!(vault.resolve_by_name("Doc2").await.is_none());
    }

    #[tokio::test]
    async fn refresh_picks_up_new_links() {
        let tmp = sample_dir();
        let vault = FsVault::open(tmp.path()).await.unwrap();
        write(tmp.path(), "Doc3.md", "[[Doc1]]");
        assert!(!vault.backlinks("Doc1.md").await.contains("Doc3.md"));

        vault.refresh().await.unwrap();
        assert!(vault.backlinks("Doc1.md").await.contains("Doc3.md"));
    }

    #[tokio::test]
    async fn open_rejects_non_directory() {
        let result = FsVault::open("/nonexistent/inklink/vault").await;
        assert!(matches!(result, Err(DocumentError::InvalidPath(_))));
    }
}
