//! Turn lifecycle with validated transitions.
//!
//! Idle -> Started -> Streaming -> Recommending? -> Completed | Errored -> Ended

use serde::Serialize;
use uuid::Uuid;

/// Phase of one conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Started,
    Streaming,
    Recommending,
    Completed,
    Errored,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid turn transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: TurnState,
    pub to: TurnState,
}

impl TurnState {
    /// Move to `to` if the lifecycle allows it.
    ///
    /// Valid transitions:
    /// - Idle -> Started
    /// - Started -> Streaming
    /// - Streaming -> Recommending
    /// - Streaming -> Completed
    /// - Streaming -> Errored
    /// - Recommending -> Completed
    /// - Completed -> Ended
    /// - Errored -> Ended
    pub fn transition(self, to: TurnState) -> Result<TurnState, InvalidTransition> {
        let valid = matches!(
            (self, to),
            (TurnState::Idle, TurnState::Started)
                | (TurnState::Started, TurnState::Streaming)
                | (TurnState::Streaming, TurnState::Recommending)
                | (TurnState::Streaming, TurnState::Completed)
                | (TurnState::Streaming, TurnState::Errored)
                | (TurnState::Recommending, TurnState::Completed)
                | (TurnState::Completed, TurnState::Ended)
                | (TurnState::Errored, TurnState::Ended)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    pub fn is_final(self) -> bool {
        self == TurnState::Ended
    }
}

/// How a turn finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Errored,
}

/// Result of a finished turn, for callers that await the turn task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub status: TurnStatus,
    /// Full generated text; empty when the turn errored.
    pub text: String,
    pub error: Option<String>,
    /// Recommended product ids in display order.
    pub product_ids: Vec<Uuid>,
    /// The client went away before the turn finished.
    pub disconnected: bool,
    /// Every state the turn passed through, starting with `Idle`.
    pub states: Vec<TurnState>,
}
