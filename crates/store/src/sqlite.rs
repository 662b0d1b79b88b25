//! SQLite persistence backend.
//!
//! Uses a single SQLite database file with two tables:
//! - `context_documents`: one row per (conversation, document), ordered by `position`
//! - `messages`: chat history used for usage breakdowns

use async_trait::async_trait;
use chrono::Utc;
use inklink_core::error::PersistenceError;
use inklink_core::message::{Message, Role};
use inklink_core::persistence::ConversationPersistence;
use inklink_core::reference::PersistedReference;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite conversation persistence backend.
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite backend from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| PersistenceError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to `:memory:` is its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite persistence initialized at {path}");
        Ok(backend)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, PersistenceError> {
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS context_documents (
                conversation_id TEXT NOT NULL,
                document_id     TEXT NOT NULL,
                property        TEXT,
                added_at        TEXT NOT NULL,
                position        INTEGER NOT NULL,
                PRIMARY KEY (conversation_id, document_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("context_documents table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                timestamp       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_reference(row: &sqlx::sqlite::SqliteRow) -> Result<PersistedReference, PersistenceError> {
        let id: String = row
            .try_get("document_id")
            .map_err(|e| PersistenceError::QueryFailed(format!("document_id column: {e}")))?;
        let property: Option<String> = row
            .try_get("property")
            .map_err(|e| PersistenceError::QueryFailed(format!("property column: {e}")))?;
        let added_at_str: String = row
            .try_get("added_at")
            .map_err(|e| PersistenceError::QueryFailed(format!("added_at column: {e}")))?;

        let added_at = chrono::DateTime::parse_from_rfc3339(&added_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| PersistenceError::QueryFailed(format!("added_at value: {e}")))?;

        Ok(PersistedReference {
            id,
            property,
            added_at,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, PersistenceError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| PersistenceError::QueryFailed(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| PersistenceError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| PersistenceError::QueryFailed(format!("content column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| PersistenceError::QueryFailed(format!("timestamp column: {e}")))?;

        let role = match role_str.as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        };
        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Message {
            id,
            role,
            content,
            timestamp,
        })
    }
}

#[async_trait]
impl ConversationPersistence for SqlitePersistence {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_context_documents(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<PersistedReference>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT document_id, property, added_at FROM context_documents
             WHERE conversation_id = ?1 ORDER BY position",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::QueryFailed(format!("SELECT failed: {e}")))?;

        rows.iter().map(Self::row_to_reference).collect()
    }

    async fn set_context_documents(
        &self,
        conversation_id: &str,
        documents: Vec<PersistedReference>,
    ) -> Result<(), PersistenceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Storage(format!("BEGIN failed: {e}")))?;

        sqlx::query("DELETE FROM context_documents WHERE conversation_id = ?1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::Storage(format!("DELETE failed: {e}")))?;

        for (position, document) in documents.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO context_documents (conversation_id, document_id, property, added_at, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(conversation_id, document_id) DO NOTHING
                "#,
            )
            .bind(conversation_id)
            .bind(&document.id)
            .bind(&document.property)
            .bind(document.added_at.to_rfc3339())
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(conversation = conversation_id, count = documents.len(), "Stored context documents");
        Ok(())
    }

    async fn remove_context_document(
        &self,
        conversation_id: &str,
        document_id: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM context_documents WHERE conversation_id = ?1 AND document_id = ?2")
            .bind(conversation_id)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Storage(format!("DELETE failed: {e}")))?;
        Ok(())
    }

    async fn clear_context_documents(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM context_documents WHERE conversation_id = ?1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Storage(format!("DELETE failed: {e}")))?;
        Ok(())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message.id)
        .bind(conversation_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT message failed: {e}")))?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY iid DESC LIMIT ?2
             ) ORDER BY iid ASC",
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::QueryFailed(format!("SELECT messages failed: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_backend() -> SqlitePersistence {
        SqlitePersistence::new("sqlite::memory:").await.unwrap()
    }

    fn reference(id: &str, property: Option<&str>) -> PersistedReference {
        PersistedReference {
            id: id.into(),
            property: property.map(String::from),
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let db = test_backend().await;
        let original = vec![
            reference("Doc3.md", Some("status")),
            reference("Doc2.md", None),
        ];
        db.set_context_documents("Doc1.md", original.clone())
            .await
            .unwrap();

        let loaded = db.get_context_documents("Doc1.md").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn set_replaces_previous_list() {
        let db = test_backend().await;
        db.set_context_documents("Doc1.md", vec![reference("A.md", None)])
            .await
            .unwrap();
        db.set_context_documents("Doc1.md", vec![reference("B.md", None)])
            .await
            .unwrap();

        let loaded = db.get_context_documents("Doc1.md").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "B.md");
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let db = test_backend().await;
        db.set_context_documents(
            "Doc1.md",
            vec![reference("A.md", None), reference("B.md", None)],
        )
        .await
        .unwrap();
        db.set_context_documents("Doc9.md", vec![reference("A.md", None)])
            .await
            .unwrap();

        db.remove_context_document("Doc1.md", "A.md").await.unwrap();
        let loaded = db.get_context_documents("Doc1.md").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "B.md");

        db.clear_context_documents("Doc1.md").await.unwrap();
        assert!(db.get_context_documents("Doc1.md").await.unwrap().is_empty());
        assert_eq!(db.get_context_documents("Doc9.md").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let db = test_backend().await;
        assert!(db.get_context_documents("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_tail_in_order() {
        let db = test_backend().await;
        db.append_message("Doc1.md", Message::user("first")).await.unwrap();
        db.append_message("Doc1.md", Message::assistant("second")).await.unwrap();
        db.append_message("Doc1.md", Message::user("third")).await.unwrap();
        db.append_message("Doc2.md", Message::user("elsewhere")).await.unwrap();

        let recent = db.recent_messages("Doc1.md", 2).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["second", "third"]);
        assert_eq!(recent[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn backend_name() {
        let db = test_backend().await;
        assert_eq!(db.name(), "sqlite");
    }
}
