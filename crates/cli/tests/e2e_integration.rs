//! End-to-end integration tests for inklink context assembly.
//!
//! These tests exercise the full pipeline from a chat message to an
//! assembled context snapshot: reference parsing, persistence, staleness
//! cleanup, auto-context, token budgeting, and rebuild cancellation.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use inklink_context::{
    ContextAssembler, ModelSelection, UsageInput, calculate_usage, estimate_tokens,
    parse_references,
};
use inklink_core::{
    AutoContextOptions, ConversationPersistence, DocumentError, DocumentId, DocumentMeta,
    DocumentStore, LinkGraph, Message, NotificationSink, ReferenceSource,
};
use inklink_store::{FilePersistence, InMemoryPersistence};
use inklink_vault::{FsVault, MemoryVault};

// ── Test doubles ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, _duration: Duration) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Yields before every vault call so overlapping builds interleave.
struct YieldingVault(MemoryVault);

#[async_trait::async_trait]
impl DocumentStore for YieldingVault {
    async fn read(&self, id: &str) -> Result<String, DocumentError> {
        tokio::task::yield_now().await;
        self.0.read(id).await
    }

    async fn exists(&self, id: &str) -> bool {
        tokio::task::yield_now().await;
        self.0.exists(id).await
    }

    async fn list_all(&self) -> Result<Vec<DocumentMeta>, DocumentError> {
        self.0.list_all().await
    }

    async fn resolve_by_name(&self, name: &str) -> Option<DocumentId> {
        tokio::task::yield_now().await;
        self.0.resolve_by_name(name).await
    }
}

#[async_trait::async_trait]
impl LinkGraph for YieldingVault {
    async fn outgoing_links(&self, id: &str) -> BTreeSet<DocumentId> {
        tokio::task::yield_now().await;
        self.0.outgoing_links(id).await
    }

    async fn backlinks(&self, id: &str) -> BTreeSet<DocumentId> {
        tokio::task::yield_now().await;
        self.0.backlinks(id).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

struct Harness {
    vault: Arc<MemoryVault>,
    persistence: Arc<InMemoryPersistence>,
    notifier: Arc<RecordingNotifier>,
    assembler: ContextAssembler,
}

fn harness(documents: &[(&str, &str)]) -> Harness {
    let vault = Arc::new(MemoryVault::with_documents(documents.iter().copied()));
    let persistence = Arc::new(InMemoryPersistence::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let assembler = ContextAssembler::new(
        vault.clone(),
        vault.clone(),
        persistence.clone(),
        notifier.clone(),
    );
    Harness {
        vault,
        persistence,
        notifier,
        assembler,
    }
}

fn ids(refs: &[inklink_core::DocumentReference]) -> Vec<String> {
    refs.iter().map(|r| r.document_id.clone()).collect()
}

// ── Testable properties ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_adding_same_reference_twice_is_idempotent() {
    let h = harness(&[("Doc1.md", "one"), ("Doc2.md", "two"), ("Doc3.md", "three")]);

    h.assembler.build_context("[[Doc2]] [[Doc3]]", Some("Doc1.md")).await.unwrap();
    let before = h.assembler.persistent_context("Doc1.md").await;

    h.assembler.build_context("again [[Doc2]]", Some("Doc1.md")).await.unwrap();
    assert!(!h.assembler.add_document("Doc3.md").await);
    let after = h.assembler.persistent_context("Doc1.md").await;

    assert_eq!(ids(&before), vec!["Doc2.md", "Doc3.md"]);
    assert_eq!(ids(&after), ids(&before));
    assert_eq!(
        h.persistence.get_context_documents("Doc1.md").await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn e2e_working_document_never_becomes_a_reference() {
    let h = harness(&[("Doc1.md", "one"), ("Doc2.md", "two")]);

    let state = h
        .assembler
        .build_context("[[Doc1]] and [[Doc2]]", Some("Doc1.md"))
        .await
        .unwrap();
    assert_eq!(ids(&state.references), vec!["Doc2.md"]);

    assert!(!h.assembler.add_document("Doc1.md").await);
    assert_eq!(ids(&h.assembler.persistent_context("Doc1.md").await), vec!["Doc2.md"]);
}

#[tokio::test]
async fn e2e_parse_round_trip() {
    let parsed = parse_references("[[A]] [[B#prop]] hello");
    let refs: Vec<_> = parsed
        .references
        .iter()
        .map(|r| (r.name.as_str(), r.property.as_deref()))
        .collect();
    assert_eq!(refs, vec![("A", None), ("B", Some("prop"))]);
    assert_eq!(parsed.cleaned, "hello");
}

#[tokio::test]
async fn e2e_overlapping_builds_keep_only_current_document() {
    let vault = Arc::new(YieldingVault(MemoryVault::with_documents([
        ("Doc1.md", "first [[Doc3]]"),
        ("Doc2.md", "second"),
        ("Doc3.md", "third"),
    ])));
    let assembler = ContextAssembler::new(
        vault.clone(),
        vault.clone(),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(RecordingNotifier::default()),
    );

    let (first, second) = tokio::join!(
        assembler.build_context("[[Doc3]]", Some("Doc1.md")),
        assembler.build_context("[[Doc3]]", Some("Doc2.md")),
    );

    let current = assembler.current_file().unwrap();
    let stored: Vec<_> = [first, second].into_iter().flatten().collect();
    assert_eq!(stored.len(), 1, "exactly one build survives");
    assert_eq!(stored[0].conversation_id, current);
    assert_eq!(assembler.current_context().unwrap(), stored[0]);
}

#[tokio::test]
async fn e2e_stale_reference_cleaned_with_single_notice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("context.jsonl");
    let vault = Arc::new(MemoryVault::with_documents([
        ("Doc1.md", "one"),
        ("Doc2.md", "two"),
        ("Old.md", "soon gone"),
    ]));

    // First session records two references
    {
        let persistence = Arc::new(FilePersistence::new(path.clone()));
        let assembler = ContextAssembler::new(
            vault.clone(),
            vault.clone(),
            persistence,
            Arc::new(RecordingNotifier::default()),
        );
        assembler
            .build_context("[[Old]] [[Doc2]]", Some("Doc1.md"))
            .await
            .unwrap();
    }
    vault.remove("Old.md").await;

    // Second session restores from disk
    let persistence = Arc::new(FilePersistence::new(path.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let assembler = ContextAssembler::new(
        vault.clone(),
        vault.clone(),
        persistence.clone(),
        notifier.clone(),
    );
    for _ in 0..3 {
        let state = assembler.build_context("", Some("Doc1.md")).await.unwrap();
        assert_eq!(ids(&state.references), vec!["Doc2.md"]);
    }

    assert_eq!(notifier.messages(), vec!["1 file no longer available: Old".to_string()]);
    let durable = FilePersistence::new(path).get_context_documents("Doc1.md").await.unwrap();
    assert_eq!(durable.len(), 1);
    assert_eq!(durable[0].id, "Doc2.md");
}

#[tokio::test]
async fn e2e_missing_set_reported_once_until_it_changes() {
    let h = harness(&[
        ("Doc1.md", "one"),
        ("A.md", "a"),
        ("B.md", "b"),
        ("C.md", "c"),
        ("D.md", "d"),
        ("E.md", "e"),
    ]);
    h.assembler
        .build_context("[[A]] [[B]] [[C]] [[D]] [[E]]", Some("Doc1.md"))
        .await
        .unwrap();
    for id in ["A.md", "B.md", "C.md", "D.md"] {
        h.vault.remove(id).await;
    }

    let state = h.assembler.build_context("", Some("Doc1.md")).await.unwrap();
    assert_eq!(ids(&state.references), vec!["E.md"]);
    assert_eq!(
        h.notifier.messages(),
        vec!["4 files no longer available: A, B, C and 1 more".to_string()]
    );
}

#[test]
fn e2e_budget_is_sum_of_category_estimates() {
    let history = vec![
        Message::user("a".repeat(13)),
        Message::assistant("b".repeat(7)),
    ];
    let attachments = vec!["c".repeat(401), "d".repeat(4)];
    let forward = UsageInput {
        history: &history,
        attachments: &attachments,
        current_input: "question?",
        recent_response: "answer",
    };
    let expected = 13usize.div_ceil(4)
        + 7usize.div_ceil(4)
        + 401usize.div_ceil(4)
        + 1
        + 9usize.div_ceil(4)
        + 6usize.div_ceil(4);

    let usage = calculate_usage(&forward, Some(32_000));
    assert_eq!(usage.total_tokens, expected);
    assert_eq!(usage.breakdown.total(), expected);

    let history_rev: Vec<_> = history.iter().rev().cloned().collect();
    let attachments_rev: Vec<_> = attachments.iter().rev().cloned().collect();
    let reversed = UsageInput {
        history: &history_rev,
        attachments: &attachments_rev,
        ..forward
    };
    assert_eq!(calculate_usage(&reversed, Some(32_000)), usage);
}

#[tokio::test]
async fn e2e_no_model_is_zero_usage_not_error() {
    let h = harness(&[("Doc1.md", "one"), ("Doc2.md", "two")]);
    let state = h.assembler.build_context("[[Doc2]]", Some("Doc1.md")).await.unwrap();
    assert_eq!(state.total_context_usage.total_tokens, 0);
    assert_eq!(state.total_context_usage.context_limit, 32_000);
    assert!(state.token_count > 0);

    h.assembler.set_model(ModelSelection::new("anthropic", "claude-sonnet-4"));
    let state = h.assembler.build_context("", Some("Doc1.md")).await.unwrap();
    assert_eq!(state.total_context_usage.context_limit, 200_000);
    assert_eq!(state.total_context_usage.total_tokens, state.token_count);
}

#[tokio::test]
async fn e2e_auto_context_toggle_reproduces_same_set() {
    let h = harness(&[
        ("Doc1.md", "Links to [[Doc2]] and [[Doc3]]"),
        ("Doc2.md", "two"),
        ("Doc3.md", "three"),
        ("Doc4.md", "points at [[Doc1]]"),
        ("Doc5.md", "manual only"),
    ]);
    h.assembler
        .build_context("[[Doc5]] [[Doc3]]", Some("Doc1.md"))
        .await
        .unwrap();

    let both = AutoContextOptions {
        include_outgoing: true,
        include_backlinks: true,
    };
    let first = h.assembler.update_auto_context_options(both).await.unwrap();

    let no_outgoing = AutoContextOptions {
        include_outgoing: false,
        include_backlinks: true,
    };
    let middle = h
        .assembler
        .update_auto_context_options(no_outgoing)
        .await
        .unwrap();
    assert_eq!(ids(&middle.references), vec!["Doc5.md", "Doc3.md", "Doc4.md"]);

    let again = h.assembler.update_auto_context_options(both).await.unwrap();

    let set = |refs: &[inklink_core::DocumentReference]| {
        refs.iter()
            .map(|r| (r.document_id.clone(), r.source))
            .collect::<BTreeSet<_>>()
    };
    assert_eq!(set(&first.references), set(&again.references));
    assert_eq!(again.references.len(), 4);
    assert!(again.references.iter().any(|r| r.document_id == "Doc2.md"
        && r.source == ReferenceSource::OutgoingLink));
    // Doc3 was referenced manually and stays a single manual row
    let doc3: Vec<_> = again
        .references
        .iter()
        .filter(|r| r.document_id == "Doc3.md")
        .collect();
    assert_eq!(doc3.len(), 1);
    assert_eq!(doc3[0].source, ReferenceSource::Manual);

    // Auto rows never reach durable storage
    let durable = h.persistence.get_context_documents("Doc1.md").await.unwrap();
    let durable_ids: Vec<_> = durable.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(durable_ids, vec!["Doc5.md", "Doc3.md"]);
}

#[tokio::test]
async fn e2e_doc1_references_doc2() {
    let doc1 = "Working notes for the week.";
    let doc2 = "x".repeat(400);
    let h = harness(&[("Doc1.md", doc1), ("Doc2.md", doc2.as_str())]);

    let state = h.assembler.build_context("[[Doc2]]", Some("Doc1.md")).await.unwrap();

    assert_eq!(ids(&state.references), vec!["Doc2.md"]);
    assert_eq!(
        h.persistence.get_context_documents("Doc1.md").await.unwrap().len(),
        1
    );

    let blocks: Vec<_> = state.context_string.split("\n\n---\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("## Doc1\n"));
    assert!(blocks[0].ends_with(doc1));
    assert!(blocks[1].starts_with("## Doc2\n"));
    assert!(blocks[1].ends_with(&doc2));

    let doc2_tokens = state.references[0].token_count;
    assert_eq!(doc2_tokens, estimate_tokens(blocks[1]));
    assert!(doc2_tokens >= 100);
    assert_eq!(state.token_count, estimate_tokens(&state.context_string));
    let parts = estimate_tokens(blocks[0]) + doc2_tokens;
    assert!(state.token_count.abs_diff(parts) <= 3);
}

// ── Filesystem pipeline ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_filesystem_vault_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(
        dir.path().join("Today.md"),
        "---\ntags: [daily]\n---\nPlan review with [[Roadmap]].\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("projects/Roadmap.md"),
        "---\nstatus: active\nowner: sam\n---\nQ3 goals\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("Inbox.md"), "see [today](Today.md)\n").unwrap();

    let vault = Arc::new(FsVault::open(dir.path()).await.unwrap());
    let assembler = ContextAssembler::new(
        vault.clone(),
        vault.clone(),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(RecordingNotifier::default()),
    )
    .with_auto_context(AutoContextOptions {
        include_outgoing: false,
        include_backlinks: true,
    })
    .with_model(ModelSelection::new("openai", "gpt-4o"));

    let state = assembler
        .build_context("What is the [[roadmap#status]]?", Some("Today.md"))
        .await
        .unwrap();

    assert_eq!(ids(&state.references), vec!["projects/Roadmap.md", "Inbox.md"]);
    assert_eq!(state.references[1].source, ReferenceSource::Backlink);
    assert!(state.context_string.starts_with(
        "## Today\nPath: Today.md\nProperties:\n- tags: daily\nContent:\nPlan review with [[Roadmap]]."
    ));
    assert!(state.context_string.contains("## Roadmap (status)\nactive"));
    assert_eq!(
        state.total_context_usage.breakdown.current_input,
        estimate_tokens("What is the ?")
    );
}
