//! Rendering documents into context blocks.
//!
//! Working document and whole-document references share the implicit block
//! format:
//!
//! ```text
//! ## Doc2
//! Path: notes/Doc2.md
//! Properties:
//! - status: draft
//! Content:
//! <first N body lines>
//! [... truncated: showing N of M lines]
//! ```
//!
//! A property reference renders as `## Doc2 (status)` followed by the value.

use inklink_core::display_name;
use std::fmt::Write;

use crate::frontmatter;
use crate::token::estimate_tokens;

/// A rendered block plus its budget bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub text: String,
    pub token_count: usize,
    pub is_truncated: bool,
    /// Tokens before clipping, when clipped.
    pub full_token_count: Option<usize>,
}

/// Render the implicit block for a whole document.
pub fn render_document(id: &str, content: &str, excerpt_lines: usize) -> String {
    let fm = frontmatter::split(content);
    let mut block = String::new();

    let _ = writeln!(block, "## {}", display_name(id));
    let _ = writeln!(block, "Path: {id}");
    if !fm.fields.is_empty() {
        block.push_str("Properties:\n");
        for (key, value) in &fm.fields {
            let _ = writeln!(block, "- {key}: {value}");
        }
    }
    block.push_str("Content:\n");

    let lines: Vec<&str> = fm.body.lines().collect();
    let shown = lines.len().min(excerpt_lines);
    block.push_str(&lines[..shown].join("\n"));
    if shown < lines.len() {
        let _ = write!(
            block,
            "\n[... truncated: showing {shown} of {} lines]",
            lines.len()
        );
    }
    block
}

/// Render a single front-matter property, or `None` when the document
/// does not define it.
pub fn render_property(id: &str, property: &str, content: &str) -> Option<String> {
    let fm = frontmatter::split(content);
    let value = fm.get(property)?;
    Some(format!("## {} ({property})\n{value}", display_name(id)))
}

/// Clip a block to `max_tokens` (0 = unlimited).
pub fn apply_budget(text: String, max_tokens: usize) -> RenderedBlock {
    let full = estimate_tokens(&text);
    if max_tokens == 0 || full <= max_tokens {
        return RenderedBlock {
            text,
            token_count: full,
            is_truncated: false,
            full_token_count: None,
        };
    }

    let cut = text
        .char_indices()
        .nth(max_tokens * 4)
        .map_or(text.len(), |(i, _)| i);
    let mut clipped = text[..cut].to_string();
    let _ = write!(
        clipped,
        "\n[... truncated: {max_tokens} of {full} tokens]"
    );

    RenderedBlock {
        token_count: estimate_tokens(&clipped),
        text: clipped,
        is_truncated: true,
        full_token_count: Some(full),
    }
}
