//! Database schema migrations.
//!
//! Applies the document schema and the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use aviary_core::error::AviaryError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), AviaryError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| AviaryError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AviaryError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: documents");
    }

    Ok(())
}

/// Version 1: schemaless documents grouped by collection path.
///
/// A collection path is slash-separated (`chats`, `chats/{id}/messages`);
/// document bodies are JSON objects queried through `json_extract`.
fn apply_v1(conn: &Connection) -> Result<(), AviaryError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            data        TEXT NOT NULL CHECK (json_valid(data)),
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents (collection);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'documents');
        ",
    )
    .map_err(|e| AviaryError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
