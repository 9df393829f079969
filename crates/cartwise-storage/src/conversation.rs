//! Session and transcript persistence.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use cartwise_core::error::CartwiseError;
use cartwise_core::store::ConversationStore;
use cartwise_core::types::{Message, NewMessage, Role, Session, Timestamp};

use crate::db::Database;

/// Repository for sessions and their messages.
#[derive(Clone, Debug)]
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new session for `user_id` with the given persona.
    pub fn create_session(&self, user_id: &str, persona_id: &str) -> Result<Session, CartwiseError> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            persona_id: persona_id.to_string(),
            created_at: Timestamp::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, persona_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    session.id.to_string(),
                    session.user_id,
                    session.persona_id,
                    session.created_at.0,
                ],
            )
            .map_err(|e| CartwiseError::Storage(format!("Failed to create session: {}", e)))?;
            Ok(())
        })?;

        debug!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Find a session by ID.
    pub fn get_session(&self, id: Uuid) -> Result<Option<Session>, CartwiseError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, user_id, persona_id, created_at FROM sessions WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| Ok(row_to_session(row)),
                )
                .optional()
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// Append a message and its product references atomically.
    pub fn create_message(&self, new: NewMessage) -> Result<Message, CartwiseError> {
        let message = Message {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            role: new.role,
            content: new.content,
            persona_id: new.persona_id,
            product_ids: new.product_ids,
            created_at: Timestamp::now(),
        };

        self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| CartwiseError::Storage(format!("Failed to begin: {}", e)))?;

            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                    rusqlite::params![message.session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;
            if !exists {
                return Err(CartwiseError::NotFound(format!(
                    "session {}",
                    message.session_id
                )));
            }

            tx.execute(
                "INSERT INTO messages (id, session_id, role, content, persona_id, created_at, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                         (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE session_id = ?2))",
                rusqlite::params![
                    message.id.to_string(),
                    message.session_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    message.persona_id,
                    message.created_at.0,
                ],
            )
            .map_err(|e| CartwiseError::Storage(format!("Failed to save message: {}", e)))?;

            for (position, product_id) in message.product_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO message_products (message_id, product_id, position)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![
                        message.id.to_string(),
                        product_id.to_string(),
                        position as i64
                    ],
                )
                .map_err(|e| {
                    CartwiseError::Storage(format!("Failed to save product reference: {}", e))
                })?;
            }

            tx.commit()
                .map_err(|e| CartwiseError::Storage(format!("Failed to commit: {}", e)))?;
            Ok(())
        })?;

        Ok(message)
    }

    /// All messages of a session, oldest first.
    pub fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, CartwiseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, persona_id, created_at
                     FROM messages WHERE session_id = ?1
                     ORDER BY seq ASC",
                )
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            collect_with_products(conn, rows)
        })
    }

    /// The latest `limit` messages of a session, oldest first.
    pub fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, CartwiseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, persona_id, created_at FROM (
                        SELECT id, session_id, role, content, persona_id, created_at, seq
                        FROM messages WHERE session_id = ?1
                        ORDER BY seq DESC
                        LIMIT ?2
                     ) ORDER BY seq ASC",
                )
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![session_id.to_string(), limit as i64],
                    |row| Ok(row_to_message(row)),
                )
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            collect_with_products(conn, rows)
        })
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn create_session(&self, user_id: &str, persona_id: &str) -> Result<Session, CartwiseError> {
        let repo = self.clone();
        let (user_id, persona_id) = (user_id.to_string(), persona_id.to_string());
        tokio::task::spawn_blocking(move || repo.create_session(&user_id, &persona_id))
            .await
            .map_err(join_error)?
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, CartwiseError> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.get_session(session_id))
            .await
            .map_err(join_error)?
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, CartwiseError> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.create_message(message))
            .await
            .map_err(join_error)?
    }

    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, CartwiseError> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.recent_messages(session_id, limit))
            .await
            .map_err(join_error)?
    }
}

fn join_error(e: tokio::task::JoinError) -> CartwiseError {
    CartwiseError::Storage(format!("Storage task failed: {}", e))
}

// ============================================================================
// Row conversion
// ============================================================================

fn collect_with_products<I>(conn: &Connection, rows: I) -> Result<Vec<Message>, CartwiseError>
where
    I: Iterator<Item = rusqlite::Result<Result<Message, CartwiseError>>>,
{
    let mut messages = Vec::new();
    for row in rows {
        let mut message = row.map_err(|e| CartwiseError::Storage(e.to_string()))??;
        message.product_ids = product_ids_for(conn, message.id)?;
        messages.push(message);
    }
    Ok(messages)
}

fn product_ids_for(conn: &Connection, message_id: Uuid) -> Result<Vec<Uuid>, CartwiseError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT product_id FROM message_products WHERE message_id = ?1 ORDER BY position",
        )
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::params![message_id.to_string()], |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;

    let mut ids = Vec::new();
    for row in rows {
        let id_str = row.map_err(|e| CartwiseError::Storage(e.to_string()))?;
        ids.push(
            Uuid::parse_str(&id_str)
                .map_err(|e| CartwiseError::Storage(format!("Invalid UUID: {}", e)))?,
        );
    }
    Ok(ids)
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, CartwiseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let user_id: String = row
        .get(1)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let persona_id: String = row
        .get(2)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(3)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;

    Ok(Session {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| CartwiseError::Storage(format!("Invalid UUID: {}", e)))?,
        user_id,
        persona_id,
        created_at: Timestamp(created_at),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, CartwiseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let session_str: String = row
        .get(1)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let role_str: String = row
        .get(2)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let content: String = row
        .get(3)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let persona_id: Option<String> = row
        .get(4)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(5)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;

    Ok(Message {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| CartwiseError::Storage(format!("Invalid UUID: {}", e)))?,
        session_id: Uuid::parse_str(&session_str)
            .map_err(|e| CartwiseError::Storage(format!("Invalid UUID: {}", e)))?,
        role: Role::parse(&role_str)
            .ok_or_else(|| CartwiseError::Storage(format!("Unknown role: {}", role_str)))?,
        content,
        persona_id,
        product_ids: Vec::new(),
        created_at: Timestamp(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_repo() -> ConversationRepository {
        ConversationRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_create_and_get_session() {
        let repo = make_repo();
        let session = repo.create_session("user-1", "friendly").unwrap();

        let found = repo.get_session(session.id).unwrap().unwrap();
        assert_eq!(found, session);
        assert!(repo.get_session(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_messages_keep_insertion_order() {
        let repo = make_repo();
        let session = repo.create_session("u", "friendly").unwrap();
        for text in ["one", "two", "three"] {
            repo.create_message(NewMessage::user(session.id, text)).unwrap();
        }

        let contents: Vec<String> = repo
            .list_messages(session.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_message_product_references_round_trip() {
        let repo = make_repo();
        let session = repo.create_session("u", "expert").unwrap();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        let saved = repo
            .create_message(
                NewMessage::assistant(session.id, "Here you go", Some("expert".to_string()))
                    .with_products(ids.clone()),
            )
            .unwrap();

        let messages = repo.list_messages(session.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], saved);
        assert_eq!(messages[0].product_ids, ids);
        assert_eq!(messages[0].role, Role::Assistant);
    }

    #[test]
    fn test_create_message_for_unknown_session() {
        let repo = make_repo();
        let err = repo
            .create_message(NewMessage::user(Uuid::new_v4(), "hello"))
            .unwrap_err();
        assert!(matches!(err, CartwiseError::NotFound(_)));
    }

    #[test]
    fn test_recent_messages_returns_latest_oldest_first() {
        let repo = make_repo();
        let session = repo.create_session("u", "friendly").unwrap();
        for i in 0..5 {
            repo.create_message(NewMessage::user(session.id, format!("m{i}")))
                .unwrap();
        }

        let contents: Vec<String> = repo
            .recent_messages(session.id, 2)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert!(repo.recent_messages(session.id, 0).unwrap().is_empty());
    }

    #[test]
    fn test_messages_are_scoped_to_session() {
        let repo = make_repo();
        let a = repo.create_session("u", "friendly").unwrap();
        let b = repo.create_session("u", "friendly").unwrap();
        repo.create_message(NewMessage::user(a.id, "for a")).unwrap();
        repo.create_message(NewMessage::user(b.id, "for b")).unwrap();

        let messages = repo.list_messages(b.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "for b");
    }

    #[tokio::test]
    async fn test_conversation_store_impl() {
        let store: Arc<dyn ConversationStore> = Arc::new(make_repo());
        let session = store.create_session("web", "friendly").await.unwrap();
        store
            .create_message(NewMessage::user(session.id, "hi"))
            .await
            .unwrap();

        assert!(store.get_session(session.id).await.unwrap().is_some());
        let recent = store.recent_messages(session.id, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].role, Role::User);
    }
}
