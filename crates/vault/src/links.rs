//! Link extraction from markdown note contents.
//!
//! Recognized forms:
//! - `[[target]]`, `[[target|alias]]`, `[[target#heading]]`, `![[embed]]`
//! - `[text](relative/path.md)` (external URLs are ignored)

use regex::Regex;
use std::sync::LazyLock;

static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[\[([^\[\]\n]+)\]\]").expect("valid wikilink regex"));

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]\n]*\]\(([^)\s]+\.md)(?:#[^)\s]*)?\)").expect("valid markdown link regex")
});

/// A raw link target found in a note, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// `[[name]]`: resolved by name anywhere in the vault.
    Name(String),
    /// `[text](path.md)`: a path relative to the linking note.
    RelativePath(String),
}

/// Extract link targets in order of first appearance, without duplicates.
pub fn extract_links(content: &str) -> Vec<LinkTarget> {
    let mut found: Vec<(usize, LinkTarget)> = Vec::new();

    for caps in WIKILINK.captures_iter(content) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let target = inner.as_str().split('|').next().unwrap_or_default();
        let target = target.split('#').next().unwrap_or_default().trim();
        if !target.is_empty() {
            found.push((whole.start(), LinkTarget::Name(target.to_string())));
        }
    }

    for caps in MARKDOWN_LINK.captures_iter(content) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let path = path.as_str();
        if path.contains("://") {
            continue;
        }
        found.push((whole.start(), LinkTarget::RelativePath(path.to_string())));
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut targets: Vec<LinkTarget> = Vec::with_capacity(found.len());
    for (_, target) in found {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

/// Join a relative link onto the directory of `source_id`, normalizing
/// `.` and `..`. Returns `None` when the path escapes the vault root.
pub fn join_relative(source_id: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = match relative.strip_prefix('/') {
        Some(_) => Vec::new(),
        None => {
            let mut dir: Vec<&str> = source_id.split('/').collect();
            dir.pop();
            dir
        }
    };

    for segment in relative.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
