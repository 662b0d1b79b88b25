//! Staleness validation: partitions a reference list into references that
//! still resolve and ids that no longer exist.

use inklink_core::{DocumentReference, DocumentStore, display_name};

/// Names listed before collapsing the rest into a count.
const NOTICE_NAME_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub valid: Vec<DocumentReference>,
    /// Ids of references whose document is gone, in input order.
    pub missing: Vec<String>,
}

/// Check every reference against the store.
pub async fn validate(store: &dyn DocumentStore, references: Vec<DocumentReference>) -> Validation {
    let mut validation = Validation::default();
    for reference in references {
        if store.exists(&reference.document_id).await {
            validation.valid.push(reference);
        } else {
            validation.missing.push(reference.document_id);
        }
    }
    validation
}

/// Notice text for a set of missing documents.
///
/// `"4 files no longer available: a, b, c and 1 more"`.
pub fn missing_notice(missing: &[String]) -> String {
    let names: Vec<String> = missing
        .iter()
        .take(NOTICE_NAME_LIMIT)
        .map(|id| display_name(id))
        .collect();
    let noun = if missing.len() == 1 { "file" } else { "files" };
    let mut notice = format!(
        "{} {noun} no longer available: {}",
        missing.len(),
        names.join(", ")
    );
    if missing.len() > NOTICE_NAME_LIMIT {
        notice.push_str(&format!(" and {} more", missing.len() - NOTICE_NAME_LIMIT));
    }
    notice
}

/// Suppresses a notice when the same missing set was the last one reported.
#[derive(Debug, Default)]
pub struct StaleReporter {
    last_reported: Option<Vec<String>>,
}

impl StaleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notice to show, or `None` when `missing` is empty or
    /// identical (as a set) to the previous report.
    pub fn report(&mut self, missing: &[String]) -> Option<String> {
        if missing.is_empty() {
            return None;
        }
        let mut key = missing.to_vec();
        key.sort();
        key.dedup();
        if self.last_reported.as_ref() == Some(&key) {
            return None;
        }
        let notice = missing_notice(missing);
        self.last_reported = Some(key);
        Some(notice)
    }
}
