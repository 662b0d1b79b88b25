//! # inklink Core
//!
//! Domain types, collaborator traits, and error definitions for inklink,
//! the context assembler that decides which notes travel alongside an AI
//! request. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates:
//! - [`DocumentStore`] and [`LinkGraph`] → `inklink-vault`
//! - [`ConversationPersistence`] → `inklink-store`
//! - [`NotificationSink`] → whichever surface shows notices (CLI, UI)
//!
//! This keeps the assembler testable against in-memory fakes and lets the
//! presentation layer pick its own storage.

pub mod error;
pub mod document;
pub mod event;
pub mod message;
pub mod notify;
pub mod persistence;
pub mod reference;

// Re-export key types at crate root for ergonomics
pub use document::{DocumentId, DocumentMeta, DocumentStore, LinkGraph, display_name};
pub use error::{DocumentError, Error, PersistenceError, Result};
pub use event::{ContextEvent, EventBus};
pub use message::{Message, Role};
pub use notify::{NotificationSink, TracingNotifier};
pub use persistence::ConversationPersistence;
pub use reference::{AutoContextOptions, DocumentReference, PersistedReference, ReferenceSource};
