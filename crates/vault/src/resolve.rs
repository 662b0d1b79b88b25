//! Name resolution: turning what a user typed into a document id.
//!
//! Resolution order:
//! 1. Exact id (`projects/Plan.md`)
//! 2. Id with `.md` appended (`projects/Plan`)
//! 3. Case-insensitive path match, with or without `.md`
//! 4. Case-insensitive file-stem match (`plan`), first id in sorted order

use inklink_core::{DocumentId, display_name};

/// Resolve `name` against a set of known ids. `ids` should be sorted so
/// that stem collisions resolve deterministically.
pub fn resolve_name<'a, I>(ids: I, name: &str) -> Option<DocumentId>
where
    I: IntoIterator<Item = &'a DocumentId>,
{
    let name = name.trim().trim_start_matches('/');
    if name.is_empty() {
        return None;
    }
    let ids: Vec<&DocumentId> = ids.into_iter().collect();

    if let Some(id) = ids.iter().find(|id| id.as_str() == name) {
        return Some((*id).clone());
    }

    let with_ext = format!("{name}.md");
    if let Some(id) = ids.iter().find(|id| id.as_str() == with_ext) {
        return Some((*id).clone());
    }

    let lower = name.to_lowercase();
    let lower_ext = with_ext.to_lowercase();
    if let Some(id) = ids.iter().find(|id| {
        let id_lower = id.to_lowercase();
        id_lower == lower || id_lower == lower_ext
    }) {
        return Some((*id).clone());
    }

    // Bare names never carry a directory; a path that did not match above is unresolvable.
    if name.contains('/') {
        return None;
    }
    let stem = display_name(name).to_lowercase();
    let stem = if lower.ends_with(".md") { stem } else { lower };
    ids.iter()
        .find(|id| display_name(id).to_lowercase() == stem)
        .map(|id| (*id).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<DocumentId> {
        vec![
            "Doc1.md".into(),
            "archive/Plan.md".into(),
            "projects/Plan.md".into(),
            "projects/Roadmap.md".into(),
            "v1.2 notes.md".into(),
        ]
    }

    #[test]
    fn exact_id_wins() {
        assert_eq!(
            resolve_name(&ids(), "projects/Plan.md").as_deref(),
            Some("projects/Plan.md")
        );
    }

    #[test]
    fn extension_is_optional() {
        assert_eq!(resolve_name(&ids(), "Doc1").as_deref(), Some("Doc1.md"));
        assert_eq!(
            resolve_name(&ids(), "projects/Roadmap").as_deref(),
            Some("projects/Roadmap.md")
        );
    }

    #[test]
    fn case_insensitive_path() {
        assert_eq!(
            resolve_name(&ids(), "PROJECTS/roadmap").as_deref(),
            Some("projects/Roadmap.md")
        );
    }

    #[test]
    fn stem_match_picks_first_sorted() {
        assert_eq!(resolve_name(&ids(), "plan").as_deref(), Some("archive/Plan.md"));
    }

    #[test]
    fn stem_with_dots_resolves() {
        assert_eq!(
            resolve_name(&ids(), "v1.2 notes").as_deref(),
            Some("v1.2 notes.md")
        );
    }

    #[test]
    fn unknown_and_empty_names_are_none() {
        assert!(resolve_name(&ids(), "Nope").is_none());
        assert!(resolve_name(&ids(), "   ").is_none());
        assert!(resolve_name(&ids(), "other/Plan").is_none());
    }
}
