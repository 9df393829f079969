//! Streaming frame protocol for one conversational turn.
//!
//! A turn emits exactly one `start`, any number of `content-delta` frames,
//! at most one `products` frame, exactly one of `complete` / `error`, and a
//! final `end`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Product, Timestamp};

/// One frame of the per-turn output protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Start {
        session_id: Uuid,
        timestamp: Timestamp,
    },
    ContentDelta {
        content: String,
        session_id: Uuid,
        timestamp: Timestamp,
    },
    Products {
        products: Vec<Product>,
        summary_text: String,
        search_query: String,
        session_id: Uuid,
        timestamp: Timestamp,
    },
    Complete {
        content: String,
        session_id: Uuid,
        timestamp: Timestamp,
    },
    Error {
        error: String,
        session_id: Uuid,
        timestamp: Timestamp,
    },
    End {
        session_id: Uuid,
        timestamp: Timestamp,
    },
}

impl StreamEvent {
    pub fn start(session_id: Uuid) -> Self {
        StreamEvent::Start {
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    pub fn content_delta(session_id: Uuid, content: impl Into<String>) -> Self {
        StreamEvent::ContentDelta {
            content: content.into(),
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    pub fn products(
        session_id: Uuid,
        products: Vec<Product>,
        summary_text: impl Into<String>,
        search_query: impl Into<String>,
    ) -> Self {
        StreamEvent::Products {
            products,
            summary_text: summary_text.into(),
            search_query: search_query.into(),
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    pub fn complete(session_id: Uuid, content: impl Into<String>) -> Self {
        StreamEvent::Complete {
            content: content.into(),
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    pub fn error(session_id: Uuid, error: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: error.into(),
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    pub fn end(session_id: Uuid) -> Self {
        StreamEvent::End {
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    /// Wire name of the frame, matching the serialized `type` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::ContentDelta { .. } => "content-delta",
            StreamEvent::Products { .. } => "products",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::End { .. } => "end",
        }
    }

    pub fn session_id(&self) -> Uuid {
        match self {
            StreamEvent::Start { session_id, .. }
            | StreamEvent::ContentDelta { session_id, .. }
            | StreamEvent::Products { session_id, .. }
            | StreamEvent::Complete { session_id, .. }
            | StreamEvent::Error { session_id, .. }
            | StreamEvent::End { session_id, .. } => *session_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            StreamEvent::Start { timestamp, .. }
            | StreamEvent::ContentDelta { timestamp, .. }
            | StreamEvent::Products { timestamp, .. }
            | StreamEvent::Complete { timestamp, .. }
            | StreamEvent::Error { timestamp, .. }
            | StreamEvent::End { timestamp, .. } => *timestamp,
        }
    }

    /// `complete` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// Ways a frame sequence can break the turn protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("sequence is empty")]
    Empty,
    #[error("first frame must be start, got {0}")]
    MissingStart(&'static str),
    #[error("last frame must be end, got {0}")]
    MissingEnd(&'static str),
    #[error("unexpected {frame} frame at position {position}")]
    Unexpected {
        frame: &'static str,
        position: usize,
    },
    #[error("more than one products frame")]
    DuplicateProducts,
    #[error("no complete or error frame before end")]
    MissingTerminal,
    #[error("frames belong to more than one session")]
    MixedSessions,
}

/// Check that `events` forms exactly one well-formed turn.
pub fn validate_sequence(events: &[StreamEvent]) -> Result<(), ProtocolViolation> {
    let first = events.first().ok_or(ProtocolViolation::Empty)?;
    if !matches!(first, StreamEvent::Start { .. }) {
        return Err(ProtocolViolation::MissingStart(first.event_name()));
    }
    let last = events.last().ok_or(ProtocolViolation::Empty)?;
    if events.len() < 2 || !matches!(last, StreamEvent::End { .. }) {
        return Err(ProtocolViolation::MissingEnd(last.event_name()));
    }

    let session_id = first.session_id();
    if events.iter().any(|e| e.session_id() != session_id) {
        return Err(ProtocolViolation::MixedSessions);
    }

    let middle = &events[1..events.len() - 1];
    let mut seen_products = false;
    let mut terminal_at: Option<usize> = None;

    for (offset, event) in middle.iter().enumerate() {
        let position = offset + 1;
        if terminal_at.is_some() {
            // Only `end` may follow the terminal frame.
            return Err(ProtocolViolation::Unexpected {
                frame: event.event_name(),
                position,
            });
        }
        match event {
            StreamEvent::ContentDelta { .. } => {}
            StreamEvent::Products { .. } => {
                if seen_products {
                    return Err(ProtocolViolation::DuplicateProducts);
                }
                seen_products = true;
            }
            StreamEvent::Complete { .. } | StreamEvent::Error { .. } => {
                terminal_at = Some(position);
            }
            StreamEvent::Start { .. } | StreamEvent::End { .. } => {
                return Err(ProtocolViolation::Unexpected {
                    frame: event.event_name(),
                    position,
                });
            }
        }
    }

    if terminal_at.is_none() {
        return Err(ProtocolViolation::MissingTerminal);
    }
    Ok(())
}
