//! Store contracts consumed by the conversation pipeline.
//!
//! The pipeline only reads the catalog and appends to the transcript;
//! implementations live in `cartwise-storage`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{CatalogQueryAttempt, Message, NewMessage, Product, Session};

/// Read access to the product catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Execute one declarative query attempt.
    ///
    /// Results honour the attempt's filters, ordering and limit.
    async fn find(&self, attempt: &CatalogQueryAttempt) -> Result<Vec<Product>>;
}

/// Session and transcript persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_session(&self, user_id: &str, persona_id: &str) -> Result<Session>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Append a message with its ordered product references.
    async fn create_message(&self, message: NewMessage) -> Result<Message>;

    /// The latest `limit` messages of a session, oldest first.
    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<Message>>;
}
