//! Conversational commerce pipeline for Cartwise.
//!
//! Extracts shopping intent from user messages, turns it into catalog
//! queries, assembles recommendations and coordinates the streamed reply.

pub mod error;
pub mod generation;
pub mod intent;
pub mod prompt;
pub mod query;
pub mod recommend;
pub mod stream;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ChatError;
pub use generation::{GenerationEngine, GenerationOptions, OllamaEngine, PromptMessage, TokenStream};
pub use intent::{Intent, IntentExtractor, PriceRange};
pub use query::QuerySynthesizer;
pub use recommend::{RecommendationAssembler, RecommendationResult};
pub use stream::{StreamCoordinator, TurnHandle, TurnRequest};
pub use turn::{TurnOutcome, TurnState, TurnStatus};
