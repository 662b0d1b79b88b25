//! Error types for the inklink domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum.

use thiserror::Error;

/// The top-level error type for all inklink operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Document store errors ---
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    // --- Conversation persistence errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Failed to read {id}: {reason}")]
    Io { id: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
