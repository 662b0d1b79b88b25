//! Context assembly pipeline: the core architectural component.
//!
//! For each conversation (one per working document) the assembler:
//!
//! 1. Parses the message for `[[references]]` and resolves them
//! 2. Merges them into the conversation's persistent reference list
//! 3. Replaces auto-sourced rows from the link graph
//! 4. Prunes references whose document is gone, reporting them once
//! 5. Renders the working document and every reference into blocks
//! 6. Joins the blocks and sizes the request against the model's window
//!
//! # Cancellation
//!
//! Every build takes a fresh [`OperationToken`] for its conversation.
//! Switching the working document synchronously drops the cached snapshot
//! and the token of both the old and the new document, so a build that
//! started before the switch finds its token gone when it finishes and
//! discards its result. Superseded work still runs to completion.
//!
//! All mutable state lives behind one `std::sync::Mutex` that is never held
//! across an `.await`: the token check and the snapshot store happen in
//! the same critical section.

use chrono::Utc;
use inklink_config::ContextConfig;
use inklink_core::{
    AutoContextOptions, ContextEvent, ConversationPersistence, DocumentReference, DocumentStore,
    EventBus, LinkGraph, Message, NotificationSink, Role,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auto_context::AutoContextService;
use crate::limits::{ModelLimits, ModelSelection};
use crate::parser::{parse_references, resolve_references};
use crate::persistent::PersistentContextStore;
use crate::render::{apply_budget, render_document, render_property};
use crate::token::{ContextUsage, TokenBudget, UsageInput, UsageMonitor, estimate_tokens, usage_notice};
use crate::validator::{self, StaleReporter};

// ── Types ─────────────────────────────────────────────────────────────────

/// Tunables for rendering and notices.
#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    /// Body lines shown per implicit block.
    pub excerpt_lines: usize,
    /// Per-reference cap in tokens (0 = unlimited). The working document
    /// is never capped.
    pub max_document_tokens: usize,
    pub separator: String,
    pub notice_duration: Duration,
    /// Messages read back for the usage breakdown.
    pub history_limit: usize,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for AssemblerSettings {
    fn from(config: &ContextConfig) -> Self {
        Self {
            excerpt_lines: config.excerpt_lines,
            max_document_tokens: config.max_document_tokens,
            separator: config.separator.clone(),
            notice_duration: config.notice_duration(),
            history_limit: 50,
        }
    }
}

/// Generation token guarding an in-flight build. Compared by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationToken(u64);

impl OperationToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// The assembled context of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContextState {
    pub conversation_id: String,
    /// Display order.
    pub references: Vec<DocumentReference>,
    pub context_string: String,
    pub token_count: usize,
    pub total_context_usage: ContextUsage,
    pub tracked_operation_id: OperationToken,
}

#[derive(Default)]
struct AssemblerState {
    current_file: Option<String>,
    next_operation: u64,
    operations: HashMap<String, OperationToken>,
    snapshots: HashMap<String, ConversationContextState>,
    options: AutoContextOptions,
    model: ModelSelection,
    stale: StaleReporter,
    usage: UsageMonitor,
}

impl AssemblerState {
    fn issue(&mut self, conversation_id: &str) -> OperationToken {
        self.next_operation += 1;
        let token = OperationToken(self.next_operation);
        self.operations.insert(conversation_id.to_string(), token);
        token
    }

    fn forget(&mut self, conversation_id: &str) {
        self.operations.remove(conversation_id);
        self.snapshots.remove(conversation_id);
    }

    /// Returns the change event when the tracked file actually changed.
    fn switch_to(&mut self, next: Option<&str>) -> Option<ContextEvent> {
        if self.current_file.as_deref() == next {
            return None;
        }
        let previous = self.current_file.take();
        if let Some(previous) = previous.as_deref() {
            self.forget(previous);
        }
        if let Some(next) = next {
            self.forget(next);
        }
        self.current_file = next.map(String::from);
        Some(ContextEvent::WorkingDocumentChanged {
            previous,
            current: self.current_file.clone(),
            timestamp: Utc::now(),
        })
    }

    fn is_current(&self, conversation_id: &str, token: OperationToken) -> bool {
        self.current_file.as_deref() == Some(conversation_id)
            && self.operations.get(conversation_id) == Some(&token)
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Builds and caches per-conversation context snapshots.
pub struct ContextAssembler {
    documents: Arc<dyn DocumentStore>,
    persistence: Arc<dyn ConversationPersistence>,
    notifier: Arc<dyn NotificationSink>,
    store: PersistentContextStore,
    auto: AutoContextService,
    budget: TokenBudget,
    settings: AssemblerSettings,
    events: Option<Arc<EventBus>>,
    state: Mutex<AssemblerState>,
}

impl ContextAssembler {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        graph: Arc<dyn LinkGraph>,
        persistence: Arc<dyn ConversationPersistence>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store: PersistentContextStore::new(persistence.clone(), documents.clone()),
            auto: AutoContextService::new(documents.clone(), graph),
            documents,
            persistence,
            notifier,
            budget: TokenBudget::default(),
            settings: AssemblerSettings::default(),
            events: None,
            state: Mutex::new(AssemblerState::default()),
        }
    }

    pub fn with_settings(mut self, settings: AssemblerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_limits(mut self, limits: ModelLimits) -> Self {
        self.budget = TokenBudget::new(limits);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_model(self, model: ModelSelection) -> Self {
        self.set_model(model);
        self
    }

    pub fn with_auto_context(self, options: AutoContextOptions) -> Self {
        self.state().options = options;
        self
    }

    fn state(&self) -> MutexGuard<'_, AssemblerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: ContextEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn notify(&self, message: &str) {
        self.notifier.notify(message, self.settings.notice_duration);
    }

    /// Assemble the context for `working` (or the tracked file when `None`).
    ///
    /// Returns `None` when no working document is known or when a later
    /// call or file switch superseded this one.
    pub async fn build_context(
        &self,
        message: &str,
        working: Option<&str>,
    ) -> Option<ConversationContextState> {
        let (conversation_id, token, options, model) = {
            let mut state = self.state();
            let conversation_id = match working {
                Some(id) => id.to_string(),
                None => state.current_file.clone()?,
            };
            if let Some(event) = state.switch_to(Some(&conversation_id)) {
                self.publish(event);
            }
            let token = state.issue(&conversation_id);
            (conversation_id, token, state.options, state.model.clone())
        };
        let conversation = conversation_id.as_str();
        debug!(conversation, operation = token.value(), "Building context");

        // References named in the message
        let parsed = parse_references(message);
        let resolved = resolve_references(self.documents.as_ref(), &parsed.references).await;
        for reference in resolved {
            if let Err(e) = self.store.add(conversation, reference).await {
                warn!(conversation, error = %e, "Failed to record reference");
            }
        }

        // Link-graph neighbours
        let auto = self.auto.collect(conversation, options).await;
        if let Err(e) = self.store.replace_auto_sourced(conversation, auto).await {
            warn!(conversation, error = %e, "Failed to refresh auto-context");
        }

        // Staleness
        let references = match self.store.get(conversation).await {
            Ok(references) => references,
            Err(e) => {
                warn!(conversation, error = %e, "Falling back to cached references");
                self.store.cached(conversation).unwrap_or_default()
            }
        };
        let validation = validator::validate(self.documents.as_ref(), references).await;
        let mut missing = self.store.take_restored_missing(conversation);
        if !validation.missing.is_empty() {
            if let Err(e) = self.store.remove_all(conversation, &validation.missing).await {
                warn!(conversation, error = %e, "Failed to prune stale references");
            }
            for id in &validation.missing {
                if !missing.contains(id) {
                    missing.push(id.clone());
                }
            }
        }

        // Rendering
        let mut blocks = Vec::with_capacity(validation.valid.len() + 1);
        match self.documents.read(conversation).await {
            Ok(content) => blocks.push(render_document(
                conversation,
                &content,
                self.settings.excerpt_lines,
            )),
            Err(e) => debug!(conversation, error = %e, "Skipping unreadable working document"),
        }
        let mut references = validation.valid;
        for reference in &mut references {
            let content = match self.documents.read(&reference.document_id).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(document = %reference.document_id, error = %e, "Skipping unreadable reference");
                    continue;
                }
            };
            let text = match reference.property.as_deref() {
                Some(property) => {
                    match render_property(&reference.document_id, property, &content) {
                        Some(text) => text,
                        None => {
                            debug!(document = %reference.document_id, property, "Property not found");
                            continue;
                        }
                    }
                }
                None => render_document(&reference.document_id, &content, self.settings.excerpt_lines),
            };
            let block = apply_budget(text, self.settings.max_document_tokens);
            reference.token_count = block.token_count;
            reference.is_truncated = block.is_truncated;
            reference.full_token_count = block.full_token_count;
            blocks.push(block.text);
        }

        // Budget
        let context_string = blocks.join(&self.settings.separator);
        let token_count = estimate_tokens(&context_string);
        let mut history = match self
            .persistence
            .recent_messages(conversation, self.settings.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                debug!(conversation, error = %e, "No history for usage breakdown");
                Vec::new()
            }
        };
        let recent_response: Option<Message> =
            if history.last().is_some_and(|m| m.role == Role::Assistant) {
                history.pop()
            } else {
                None
            };
        let attachments = [context_string];
        let usage = self.budget.usage(
            &model,
            &UsageInput {
                history: &history,
                attachments: &attachments,
                current_input: &parsed.cleaned,
                recent_response: recent_response.as_ref().map_or("", |m| m.content.as_str()),
            },
        );
        let [context_string] = attachments;

        // Cancellation check and store
        let mut notices = Vec::new();
        let snapshot = {
            let mut state = self.state();
            if !state.is_current(conversation, token) {
                drop(state);
                debug!(conversation, operation = token.value(), "Discarding superseded build");
                self.store.defer_missing(conversation, missing);
                self.publish(ContextEvent::RebuildSuperseded {
                    conversation_id,
                    operation: token.value(),
                    timestamp: Utc::now(),
                });
                return None;
            }

            let snapshot = ConversationContextState {
                conversation_id: conversation_id.clone(),
                references,
                context_string,
                token_count,
                total_context_usage: usage,
                tracked_operation_id: token,
            };
            state
                .snapshots
                .insert(conversation_id.clone(), snapshot.clone());

            if let Some(notice) = state.stale.report(&missing) {
                notices.push(notice);
            }
            if let Some(level) = state.usage.observe(&snapshot.total_context_usage) {
                notices.push(usage_notice(&snapshot.total_context_usage));
                self.publish(ContextEvent::UsageThresholdCrossed {
                    conversation_id: conversation_id.clone(),
                    level: level.to_string(),
                    usage_percentage: snapshot.total_context_usage.usage_percentage,
                    timestamp: Utc::now(),
                });
            }
            snapshot
        };

        if !missing.is_empty() {
            info!(conversation, count = missing.len(), "Pruned stale references");
            self.publish(ContextEvent::ReferencesPruned {
                conversation_id: conversation_id.clone(),
                document_ids: missing,
                timestamp: Utc::now(),
            });
        }
        for notice in &notices {
            self.notify(notice);
        }
        self.publish(ContextEvent::ContextBuilt {
            conversation_id,
            references: snapshot.references.len(),
            token_count: snapshot.token_count,
            timestamp: Utc::now(),
        });
        Some(snapshot)
    }

    /// Snapshot of the tracked working document, if one has been built.
    pub fn current_context(&self) -> Option<ConversationContextState> {
        let state = self.state();
        let current = state.current_file.as_deref()?;
        state.snapshots.get(current).cloned()
    }

    /// The tracked working document.
    pub fn current_file(&self) -> Option<String> {
        self.state().current_file.clone()
    }

    /// Ordered references of a conversation (manual and auto).
    pub async fn persistent_context(&self, conversation_id: &str) -> Vec<DocumentReference> {
        match self.store.get(conversation_id).await {
            Ok(references) => references,
            Err(e) => {
                warn!(conversation = conversation_id, error = %e, "Failed to load references");
                self.store.cached(conversation_id).unwrap_or_default()
            }
        }
    }

    /// Add a document to the tracked conversation. Returns whether the
    /// persistent set changed.
    pub async fn add_document(&self, document_id: &str) -> bool {
        let Some(conversation) = self.current_file() else {
            debug!(document = document_id, "No working document; ignoring add");
            return false;
        };
        if !self.documents.exists(document_id).await {
            debug!(document = document_id, "Ignoring add of unknown document");
            return false;
        }
        match self
            .store
            .add(&conversation, DocumentReference::manual(document_id))
            .await
        {
            Ok(changed) => changed,
            Err(e) => {
                warn!(conversation, error = %e, "Failed to add document");
                false
            }
        }
    }

    /// Remove a document from the tracked conversation.
    pub async fn remove_document(&self, document_id: &str) -> bool {
        let Some(conversation) = self.current_file() else {
            return false;
        };
        match self.store.remove(&conversation, document_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(conversation, error = %e, "Failed to remove document");
                false
            }
        }
    }

    /// Empty a conversation's reference list and drop its snapshot.
    pub async fn clear_persistent_context(&self, conversation_id: &str) {
        self.state().forget(conversation_id);
        if let Err(e) = self.store.clear(conversation_id).await {
            warn!(conversation = conversation_id, error = %e, "Failed to clear references");
        }
    }

    /// Track a different working document (or none).
    ///
    /// Synchronous: cached state for the old and new document is dropped
    /// and their in-flight builds are invalidated before this returns.
    pub fn set_current_file(&self, document_id: Option<&str>) {
        let event = self.state().switch_to(document_id);
        if let Some(event) = event {
            debug!(current = ?document_id, "Working document changed");
            self.publish(event);
        }
    }

    pub fn auto_context_options(&self) -> AutoContextOptions {
        self.state().options
    }

    /// Change the auto-context toggles and re-derive auto rows for every
    /// open conversation. The tracked conversation is rebuilt.
    pub async fn update_auto_context_options(
        &self,
        options: AutoContextOptions,
    ) -> Option<ConversationContextState> {
        self.state().options = options;
        for conversation in self.store.open_conversations() {
            let auto = self.auto.collect(&conversation, options).await;
            if let Err(e) = self.store.replace_auto_sourced(&conversation, auto).await {
                warn!(conversation, error = %e, "Failed to refresh auto-context");
            }
        }
        let current = self.current_file()?;
        self.rebuild_auto_context(&current).await
    }

    /// Rebuild a working document's context without a new message.
    pub async fn rebuild_auto_context(&self, working: &str) -> Option<ConversationContextState> {
        self.build_context("", Some(working)).await
    }

    pub fn model(&self) -> ModelSelection {
        self.state().model.clone()
    }

    /// Change the provider/model pairing used to resolve the context window.
    pub fn set_model(&self, model: ModelSelection) {
        debug!(provider = ?model.provider, model = ?model.model, "Model selection changed");
        self.state().model = model;
    }

    /// Forget everything about a deleted document's own conversation.
    pub async fn handle_document_deleted(&self, document_id: &str) {
        let event = {
            let mut state = self.state();
            state.forget(document_id);
            if state.current_file.as_deref() == Some(document_id) {
                state.switch_to(None)
            } else {
                None
            }
        };
        if let Some(event) = event {
            self.publish(event);
        }
        if let Err(e) = self.store.destroy(document_id).await {
            warn!(conversation = document_id, error = %e, "Failed to drop conversation");
        }
    }

    /// Start a new notice session: usage thresholds and stale sets may be
    /// announced again.
    pub fn reset_notices(&self) {
        let mut state = self.state();
        state.usage.reset();
        state.stale = StaleReporter::new();
    }
}
