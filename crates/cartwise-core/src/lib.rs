pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;

pub use config::CartwiseConfig;
pub use error::{CartwiseError, Result};
pub use events::{validate_sequence, ProtocolViolation, StreamEvent};
pub use store::{CatalogStore, ConversationStore};
pub use types::*;
