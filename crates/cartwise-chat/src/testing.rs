//! In-memory fakes shared by the unit tests of this crate.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use uuid::Uuid;

use cartwise_core::error::{CartwiseError, Result};
use cartwise_core::store::{CatalogStore, ConversationStore};
use cartwise_core::types::{
    AttemptStage, CatalogFilter, CatalogQueryAttempt, Category, Color, Message, NewMessage, Product, Session,
    Timestamp,
};

use crate::error::ChatError;
use crate::generation::{GenerationEngine, GenerationOptions, PromptMessage, TokenStream};

pub fn product(name: &str, category: Category, color: Color, price: f64) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{name} from the catalog"),
        category,
        color,
        brand: None,
        price,
        original_price: None,
        rating: 4.5,
        review_count: 100,
        image_ref: String::new(),
        stock: 5,
        active: true,
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub struct FakeCatalog {
    products: Vec<Product>,
    failing: Option<AttemptStage>,
    delay: Option<Duration>,
    calls: Mutex<Vec<CatalogQueryAttempt>>,
}

impl FakeCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            failing: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, stage: AttemptStage) -> Self {
        self.failing = Some(stage);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<AttemptStage> {
        self.calls.lock().unwrap().iter().map(|a| a.stage).collect()
    }

    /// Search terms of the keyword attempts that ran, in order.
    pub fn keyword_terms(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|a| a.filters.iter())
            .filter_map(|f| match f {
                CatalogFilter::TextContains(term) => Some(term.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn find(&self, attempt: &CatalogQueryAttempt) -> Result<Vec<Product>> {
        self.calls.lock().unwrap().push(attempt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing == Some(attempt.stage) {
            return Err(CartwiseError::Catalog("catalog offline".to_string()));
        }

        let mut found: Vec<Product> = self
            .products
            .iter()
            .filter(|p| attempt.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.review_count.cmp(&a.review_count))
        });
        found.truncate(attempt.limit);
        Ok(found)
    }
}

// =============================================================================
// Conversations
// =============================================================================

#[derive(Default)]
pub struct MemoryConversations {
    sessions: Mutex<Vec<Session>>,
    messages: Mutex<Vec<Message>>,
    fail_writes: bool,
}

impl MemoryConversations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions can be created but every message write fails.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn create_session(&self, user_id: &str, persona_id: &str) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            persona_id: persona_id.to_string(),
            created_at: Timestamp::now(),
        };
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .cloned())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        if self.fail_writes {
            return Err(CartwiseError::Storage("disk full".to_string()));
        }
        let message = Message {
            id: Uuid::new_v4(),
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            persona_id: message.persona_id,
            product_ids: message.product_ids,
            created_at: Timestamp::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<Message>> {
        let all: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }
}

// =============================================================================
// Generation
// =============================================================================

enum Ending {
    Complete,
    Fail(String),
    Stall,
}

/// Replays a fixed list of fragments and records every prompt it receives.
pub struct ScriptedEngine {
    tokens: Vec<String>,
    ending: Ending,
    refuse: bool,
    pacing: Option<Duration>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedEngine {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ending: Ending::Complete,
            refuse: false,
            pacing: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail with `message` after the scripted fragments.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.ending = Ending::Fail(message.to_string());
        self
    }

    /// Never finish after the scripted fragments.
    pub fn stalling(mut self) -> Self {
        self.ending = Ending::Stall;
        self
    }

    /// Wait `pause` before each scripted fragment.
    pub fn pacing(mut self, pause: Duration) -> Self {
        self.pacing = Some(pause);
        self
    }

    /// Fail before producing a stream.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn generate(
        &self,
        messages: Vec<PromptMessage>,
        _options: &GenerationOptions,
    ) -> std::result::Result<TokenStream, ChatError> {
        self.prompts.lock().unwrap().push(messages);
        if self.refuse {
            return Err(ChatError::Generation("connection refused".to_string()));
        }

        let mut items: Vec<std::result::Result<String, ChatError>> =
            self.tokens.iter().cloned().map(Ok).collect();
        if let Ending::Fail(message) = &self.ending {
            items.push(Err(ChatError::Generation(message.clone())));
        }
        let scripted = match self.pacing {
            Some(pause) => futures::stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(pause).await;
                    item
                })
                .boxed(),
            None => futures::stream::iter(items).boxed(),
        };
        Ok(match self.ending {
            Ending::Stall => scripted.chain(futures::stream::pending()).boxed(),
            _ => scripted,
        })
    }
}

/// Engine whose fragments are pushed by the test through a channel.
/// Dropping the sender completes the reply.
pub struct ChannelEngine {
    receiver: Mutex<Option<futures::channel::mpsc::UnboundedReceiver<std::result::Result<String, ChatError>>>>,
}

impl ChannelEngine {
    pub fn new() -> (
        Self,
        futures::channel::mpsc::UnboundedSender<std::result::Result<String, ChatError>>,
    ) {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl GenerationEngine for ChannelEngine {
    async fn generate(
        &self,
        _messages: Vec<PromptMessage>,
        _options: &GenerationOptions,
    ) -> std::result::Result<TokenStream, ChatError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChatError::Generation("engine already used".to_string()))?;
        Ok(receiver.boxed())
    }
}
