//! Context document references.
//!
//! A [`DocumentReference`] is one row of a conversation's context set. Only
//! the `{id, property?, added_at}` projection ([`PersistedReference`]) is
//! written to durable storage; token counts are recomputed on every
//! assembly and auto-sourced rows are re-derived from the link graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::display_name;

/// Why a document is in a conversation's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSource {
    /// The user referenced it explicitly.
    Manual,
    /// The working document links to it.
    OutgoingLink,
    /// It links to the working document.
    Backlink,
}

impl ReferenceSource {
    pub fn is_auto(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::OutgoingLink => write!(f, "outgoing-link"),
            Self::Backlink => write!(f, "backlink"),
        }
    }
}

/// One context document in a conversation's reference set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Stable document identifier
    pub document_id: String,

    /// Name shown to the user
    pub display_name: String,

    /// Named front-matter field to extract instead of the full content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    pub source: ReferenceSource,

    /// Estimated tokens of the rendered block (0 until assembled)
    #[serde(default)]
    pub token_count: usize,

    #[serde(default)]
    pub is_truncated: bool,

    /// Tokens the block would have used without truncation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_token_count: Option<usize>,

    pub added_at: DateTime<Utc>,
}

impl DocumentReference {
    /// A manual reference to the whole document.
    pub fn manual(document_id: impl Into<String>) -> Self {
        Self::new(document_id, ReferenceSource::Manual)
    }

    pub fn new(document_id: impl Into<String>, source: ReferenceSource) -> Self {
        let document_id = document_id.into();
        Self {
            display_name: display_name(&document_id),
            document_id,
            property: None,
            source,
            token_count: 0,
            is_truncated: false,
            full_token_count: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// The durable projection of this reference.
    pub fn to_persisted(&self) -> PersistedReference {
        PersistedReference {
            id: self.document_id.clone(),
            property: self.property.clone(),
            added_at: self.added_at,
        }
    }
}

/// Shape of a reference in durable storage. Must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl PersistedReference {
    /// Restore as a manual reference; only manual rows are ever persisted.
    pub fn into_reference(self) -> DocumentReference {
        DocumentReference {
            display_name: display_name(&self.id),
            document_id: self.id,
            property: self.property,
            source: ReferenceSource::Manual,
            token_count: 0,
            is_truncated: false,
            full_token_count: None,
            added_at: self.added_at,
        }
    }
}

/// Which link-graph neighbours are pulled into context automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoContextOptions {
    #[serde(default)]
    pub include_outgoing: bool,
    #[serde(default)]
    pub include_backlinks: bool,
}

impl AutoContextOptions {
    pub fn is_enabled(&self) -> bool {
        self.include_outgoing || self.include_backlinks
    }
}
