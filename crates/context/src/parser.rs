//! Reference parsing: pulls `[[document]]` mentions out of a chat message.
//!
//! Syntax:
//! - `[[name]]`: the whole document
//! - `[[name#property]]`: one front-matter property of the document
//! - `[[name|alias]]`: alias is display-only and dropped
//! - `+[[name]]`: persistence marker; accepted and recorded, but every
//!   reference is persistent so it changes nothing
//!
//! Malformed or empty references are left in the text untouched. Names
//! that do not resolve to a document are dropped without complaint: users
//! type partial names while composing.

use inklink_core::{DocumentReference, DocumentStore};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\+)?\[\[([^\[\]\n]*)\]\]").expect("valid reference regex"));

/// One reference as typed, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub name: String,
    pub property: Option<String>,
    /// Whether the `+` marker was present.
    pub marked_persistent: bool,
}

/// Result of parsing a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMessage {
    pub references: Vec<ParsedReference>,
    /// The message with recognized references removed, whitespace collapsed.
    pub cleaned: String,
}

/// Extract references from `text`.
pub fn parse_references(text: &str) -> ParsedMessage {
    let mut references: Vec<ParsedReference> = Vec::new();
    let mut kept = String::with_capacity(text.len());
    let mut cursor = 0;

    for caps in REFERENCE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let Some(reference) = parse_inner(inner.as_str(), caps.get(1).is_some()) else {
            continue;
        };

        kept.push_str(&text[cursor..whole.start()]);
        kept.push(' ');
        cursor = whole.end();

        if !references
            .iter()
            .any(|r| r.name == reference.name && r.property == reference.property)
        {
            references.push(reference);
        }
    }
    kept.push_str(&text[cursor..]);

    ParsedMessage {
        references,
        cleaned: kept.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn parse_inner(inner: &str, marked_persistent: bool) -> Option<ParsedReference> {
    let target = inner.split('|').next().unwrap_or_default();
    let (name, property) = match target.split_once('#') {
        Some((name, property)) => (name, Some(property.trim())),
        None => (target, None),
    };
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(ParsedReference {
        name: name.to_string(),
        property: property.filter(|p| !p.is_empty()).map(String::from),
        marked_persistent,
    })
}

/// Resolve parsed references to manual [`DocumentReference`]s.
///
/// Unresolvable names are skipped. The first mention of a document wins
/// when the same document is named twice.
pub async fn resolve_references(
    store: &dyn DocumentStore,
    parsed: &[ParsedReference],
) -> Vec<DocumentReference> {
    let mut resolved: Vec<DocumentReference> = Vec::with_capacity(parsed.len());
    for reference in parsed {
        let Some(id) = store.resolve_by_name(&reference.name).await else {
            debug!(name = %reference.name, "Dropping unresolved reference");
            continue;
        };
        if resolved.iter().any(|r| r.document_id == id) {
            continue;
        }
        let mut document = DocumentReference::manual(id);
        document.property = reference.property.clone();
        resolved.push(document);
    }
    resolved
}
