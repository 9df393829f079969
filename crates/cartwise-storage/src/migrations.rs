//! Database schema migrations.
//!
//! Applies the initial schema: products, sessions, messages,
//! message_products and the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use cartwise_core::error::CartwiseError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), CartwiseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CartwiseError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CartwiseError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: catalog and conversation tables.
fn apply_v1(conn: &Connection) -> Result<(), CartwiseError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            id              TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            category        TEXT NOT NULL,
            color           TEXT NOT NULL,
            brand           TEXT,
            price           REAL NOT NULL CHECK (price >= 0),
            original_price  REAL,
            rating          REAL NOT NULL DEFAULT 0,
            review_count    INTEGER NOT NULL DEFAULT 0,
            image_ref       TEXT NOT NULL DEFAULT '',
            stock           INTEGER NOT NULL DEFAULT 0,
            active          INTEGER NOT NULL DEFAULT 1,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_products_category_color
            ON products (category, color);

        CREATE INDEX IF NOT EXISTS idx_products_popularity
            ON products (rating DESC, review_count DESC);

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            persona_id  TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL REFERENCES sessions (id) ON DELETE CASCADE,
            role        TEXT NOT NULL
                        CHECK (role IN ('system', 'user', 'assistant')),
            content     TEXT NOT NULL,
            persona_id  TEXT,
            created_at  INTEGER NOT NULL,
            seq         INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages (session_id, seq);

        CREATE TABLE IF NOT EXISTS message_products (
            message_id  TEXT NOT NULL REFERENCES messages (id) ON DELETE CASCADE,
            product_id  TEXT NOT NULL,
            position    INTEGER NOT NULL,
            PRIMARY KEY (message_id, position)
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| CartwiseError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        for table in ["products", "sessions", "messages", "message_products"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn test_messages_role_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, persona_id, created_at) VALUES ('s1', 'u', 'p', 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO messages (id, session_id, role, content, created_at, seq)
             VALUES ('m1', 's1', 'narrator', 'hi', 0, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_messages_require_existing_session() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO messages (id, session_id, role, content, created_at, seq)
             VALUES ('m1', 'missing', 'user', 'hi', 0, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_products_reject_negative_price() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO products (id, name, category, color, price)
             VALUES ('p1', 'Bad', 'shoes', 'red', -1.0)",
            [],
        );
        assert!(result.is_err());
    }
}
