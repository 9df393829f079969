//! Streaming response coordinator.
//!
//! Drives one turn: persists the user message, relays generated fragments
//! as `content-delta` frames, optionally attaches recommendations, persists
//! the reply and closes the frame sequence. Every turn that reaches `start`
//! ends with exactly one `complete` or `error` followed by `end`, unless the
//! client disconnects, in which case frames simply stop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cartwise_core::config::{CartwiseConfig, PersonaConfig};
use cartwise_core::events::StreamEvent;
use cartwise_core::store::{CatalogStore, ConversationStore};
use cartwise_core::types::{NewMessage, Session};

use crate::error::ChatError;
use crate::generation::{GenerationEngine, GenerationOptions, PromptMessage};
use crate::intent::normalize;
use crate::prompt::build_prompt;
use crate::recommend::{RecommendationAssembler, RecommendationResult};
use crate::turn::{TurnOutcome, TurnState, TurnStatus};

/// Frames buffered per turn before the coordinator waits on the client.
const EVENT_BUFFER: usize = 64;

/// A validated user message bound to its session.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub session: Session,
    pub text: String,
}

/// A running turn.
pub struct TurnHandle {
    pub session_id: Uuid,
    /// Frames in emission order; closed when the turn is over.
    pub events: mpsc::Receiver<StreamEvent>,
    /// Cancel to signal that the client went away.
    pub cancel: CancellationToken,
    pub outcome: JoinHandle<TurnOutcome>,
}

/// Owns the per-turn pipeline. Cheap to clone.
#[derive(Clone)]
pub struct StreamCoordinator {
    config: Arc<CartwiseConfig>,
    conversations: Arc<dyn ConversationStore>,
    engine: Arc<dyn GenerationEngine>,
    assembler: Arc<RecommendationAssembler>,
}

impl StreamCoordinator {
    pub fn new(
        config: Arc<CartwiseConfig>,
        conversations: Arc<dyn ConversationStore>,
        catalog: Arc<dyn CatalogStore>,
        engine: Arc<dyn GenerationEngine>,
    ) -> Self {
        let assembler = Arc::new(RecommendationAssembler::new(catalog, &config.recommendation));
        Self {
            config,
            conversations,
            engine,
            assembler,
        }
    }

    pub fn config(&self) -> &CartwiseConfig {
        &self.config
    }

    pub fn assembler(&self) -> &RecommendationAssembler {
        &self.assembler
    }

    /// Create a session, resolving unknown or missing personas to the default.
    pub async fn open_session(
        &self,
        user_id: &str,
        persona_id: Option<&str>,
    ) -> Result<Session, ChatError> {
        let persona_id = self
            .config
            .persona(persona_id)
            .map(|p| p.id.clone())
            .unwrap_or_else(|| self.config.chat.default_persona.clone());
        let session = self
            .conversations
            .create_session(user_id, &persona_id)
            .await?;
        info!(session_id = %session.id, persona = %persona_id, "Session opened");
        Ok(session)
    }

    /// Validate a user message and look up its session.
    ///
    /// Rejections happen before any frame is produced.
    pub async fn prepare(&self, session_id: Uuid, text: &str) -> Result<TurnRequest, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.config.chat.max_message_length;
        if text.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }

        let session = self
            .conversations
            .get_session(session_id)
            .await?
            .ok_or(ChatError::SessionNotFound(session_id))?;

        Ok(TurnRequest {
            session,
            text: text.to_string(),
        })
    }

    /// Validate the message and run the turn on a background task.
    pub async fn start_turn(&self, session_id: Uuid, text: &str) -> Result<TurnHandle, ChatError> {
        let request = self.prepare(session_id, text).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let coordinator = self.clone();
        let token = cancel.clone();
        let outcome = tokio::spawn(async move { coordinator.run_turn(request, tx, token).await });

        Ok(TurnHandle {
            session_id,
            events: rx,
            cancel,
            outcome,
        })
    }

    /// Run one turn to completion, sending frames to `events`.
    ///
    /// Storage failures are logged and never change the frame sequence.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let session_id = request.session.id;
        let persona = session_persona(&self.config, &request.session).cloned();
        let persona_id = persona.as_ref().map(|p| p.id.clone());
        let mut sink = EventSink::new(events, cancel);
        let mut turn = Turn::new(session_id);

        // Read history before the new message lands so it is not sent twice.
        let history = match self
            .conversations
            .recent_messages(session_id, self.config.chat.history_messages)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(%session_id, error = %e, "Failed to load history");
                Vec::new()
            }
        };
        self.persist(NewMessage::user(session_id, &request.text), "user")
            .await;

        turn.advance(TurnState::Started);
        info!(%session_id, chars = request.text.chars().count(), "Turn started");
        sink.emit(StreamEvent::start(session_id)).await;

        turn.advance(TurnState::Streaming);
        let prompt = build_prompt(persona.as_ref(), &history, &request.text);
        let text = match self.stream_reply(prompt, session_id, &mut sink).await {
            Ok(text) => text,
            Err(e) => {
                error!(%session_id, error = %e, "Generation failed");
                turn.advance(TurnState::Errored);
                sink.emit(StreamEvent::error(session_id, e.user_message()))
                    .await;
                turn.advance(TurnState::Ended);
                sink.emit(StreamEvent::end(session_id)).await;
                return turn.finish(TurnStatus::Errored, String::new(), Some(e.to_string()), &sink);
            }
        };

        if sink.is_connected() && self.should_recommend(&request.text) {
            turn.advance(TurnState::Recommending);
            if let Some(result) = self.recommend(&request.text, session_id).await {
                turn.product_ids = result.product_ids();
                sink.emit(StreamEvent::products(
                    session_id,
                    result.products,
                    result.summary_text.clone(),
                    result.search_query,
                ))
                .await;
                let message = NewMessage::assistant(session_id, result.summary_text, persona_id.clone())
                    .with_products(turn.product_ids.clone());
                self.persist(message, "products").await;
            }
        } else if !sink.is_connected() {
            debug!(%session_id, "Client gone, skipping recommendations");
        }

        self.persist(
            NewMessage::assistant(session_id, text.clone(), persona_id),
            "reply",
        )
        .await;
        turn.advance(TurnState::Completed);
        sink.emit(StreamEvent::complete(session_id, text.clone()))
            .await;
        turn.advance(TurnState::Ended);
        sink.emit(StreamEvent::end(session_id)).await;

        info!(
            %session_id,
            chars = text.chars().count(),
            products = turn.product_ids.len(),
            "Turn completed"
        );
        turn.finish(TurnStatus::Completed, text, None, &sink)
    }

    /// Relay fragments until the engine finishes, returning the full text.
    ///
    /// Fragments keep being drained after a disconnect so the reply can
    /// still be stored.
    async fn stream_reply(
        &self,
        prompt: Vec<PromptMessage>,
        session_id: Uuid,
        sink: &mut EventSink,
    ) -> Result<String, ChatError> {
        let generation = &self.config.generation;
        let token_timeout = Duration::from_secs(generation.token_timeout_secs);
        let deadline = Instant::now() + Duration::from_secs(generation.turn_timeout_secs);
        let options = GenerationOptions::from(generation);

        let mut fragments = tokio::time::timeout_at(deadline, self.engine.generate(prompt, &options))
            .await
            .map_err(|_| ChatError::GenerationTimeout(generation.turn_timeout_secs))??;

        let mut text = String::new();
        loop {
            let wait_until = deadline.min(Instant::now() + token_timeout);
            let next = match tokio::time::timeout_at(wait_until, fragments.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let secs = if Instant::now() >= deadline {
                        generation.turn_timeout_secs
                    } else {
                        generation.token_timeout_secs
                    };
                    return Err(ChatError::GenerationTimeout(secs));
                }
            };

            match next {
                None => return Ok(text),
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    text.push_str(&fragment);
                    sink.emit(StreamEvent::content_delta(session_id, fragment))
                        .await;
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }

    /// Recommend when the message carries a shopping intent or explicitly
    /// asks for suggestions.
    pub fn should_recommend(&self, text: &str) -> bool {
        if !self.config.recommendation.enabled {
            return false;
        }
        self.assembler.extractor().extract(text).has_intent || self.explicit_request(text)
    }

    fn explicit_request(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.config
            .chat
            .recommend_keywords
            .iter()
            .any(|k| !k.is_empty() && normalized.contains(&normalize(k)))
    }

    async fn recommend(&self, text: &str, session_id: Uuid) -> Option<RecommendationResult> {
        let limit = Duration::from_millis(self.config.recommendation.timeout_ms);
        let work = async {
            if self.explicit_request(text) {
                self.assembler.recommend_requested(text).await
            } else {
                self.assembler.recommend(text).await
            }
        };

        match tokio::time::timeout(limit, work).await {
            Ok(result) if result.has_recommendations => Some(result),
            Ok(_) => None,
            Err(_) => {
                warn!(%session_id, timeout_ms = self.config.recommendation.timeout_ms, "Recommendation timed out");
                None
            }
        }
    }

    async fn persist(&self, message: NewMessage, kind: &'static str) {
        let session_id = message.session_id;
        if let Err(e) = self.conversations.create_message(message).await {
            warn!(%session_id, kind, error = %e, "Failed to persist message");
        }
    }
}

/// Persona a session resolves to.
pub fn session_persona<'a>(config: &'a CartwiseConfig, session: &Session) -> Option<&'a PersonaConfig> {
    config.persona(Some(&session.persona_id))
}

// =============================================================================
// Turn bookkeeping
// =============================================================================

struct Turn {
    session_id: Uuid,
    state: TurnState,
    states: Vec<TurnState>,
    product_ids: Vec<Uuid>,
}

impl Turn {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: TurnState::Idle,
            states: vec![TurnState::Idle],
            product_ids: Vec::new(),
        }
    }

    fn advance(&mut self, next: TurnState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "Turn state out of order");
                self.state = next;
            }
        }
        self.states.push(self.state);
    }

    fn finish(
        self,
        status: TurnStatus,
        text: String,
        error: Option<String>,
        sink: &EventSink,
    ) -> TurnOutcome {
        TurnOutcome {
            session_id: self.session_id,
            status,
            text,
            error,
            product_ids: self.product_ids,
            disconnected: !sink.connected,
            states: self.states,
        }
    }
}

/// Frame sender that goes quiet once the client disconnects.
struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    connected: bool,
}

impl EventSink {
    fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            connected: true,
        }
    }

    fn is_connected(&mut self) -> bool {
        if self.connected && (self.cancel.is_cancelled() || self.tx.is_closed()) {
            self.connected = false;
        }
        self.connected
    }

    async fn emit(&mut self, event: StreamEvent) {
        if !self.is_connected() {
            return;
        }
        let name = event.event_name();
        let delivered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        };
        if !delivered {
            self.connected = false;
            debug!(frame = name, "Client disconnected, dropping frames");
        }
    }
}
